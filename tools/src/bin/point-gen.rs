use anyhow::Context as _;
use anyhow::Result;
use rand::SeedableRng as _;

const USAGE: &str = "Usage: point-gen [options] [out-points] >out.points";

fn main() -> Result<()> {
    let mut options = getopts::Options::new();
    options.optopt("n", "count", "number of points (default: 1000)", "COUNT");
    options.optopt("r", "radius", "radius of the disc (default: 20)", "RADIUS");
    options.optopt("s", "seed", "random seed (default: from the clock)", "SEED");

    let matches = lloyd_tools::parse_args(options, USAGE, 1)?;
    let _chrome_trace_guard = lloyd_tools::init_tracing(&matches);

    let count: usize = matches
        .opt_get_default::<usize>("n", 1000)
        .context("invalid value for option 'count'")?;
    let radius: f64 = matches
        .opt_get_default::<f64>("r", 20.0)
        .context("invalid value for option 'radius'")?;
    let radius = lloyd_tools::generate::check_radius(radius)?;
    let seed: u64 = matches
        .opt_get_default::<u64>("s", lloyd_tools::generate::clock_seed())
        .context("invalid value for option 'seed'")?;
    tracing::info!(count, radius, seed, "generating points");

    let mut rng = rand_pcg::Pcg64::seed_from_u64(seed);
    let points = lloyd_tools::generate::disc(&mut rng, count, radius);

    let output = lloyd_tools::writer(matches.free.first())?;
    lloyd_tools::points::write(output, &points, false).context("failed to write points")?;

    Ok(())
}
