use anyhow::Context as _;
use anyhow::Result;
use lloyd::EmptyClusters;
use lloyd::KMeans;
use rand::SeedableRng as _;
use std::time::Instant;

const USAGE: &str = "Usage: kmeans [options] [in-points [out]] <in.points >out";

#[derive(Clone, Copy)]
enum Format {
    Points,
    Eps,
    Svg,
}

impl std::str::FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "points" => Self::Points,
            "eps" => Self::Eps,
            "svg" => Self::Svg,
            _ => anyhow::bail!("expected points/eps/svg"),
        })
    }
}

fn main() -> Result<()> {
    let mut options = getopts::Options::new();
    options.optopt("k", "clusters", "number of clusters (default: 5)", "COUNT");
    options.optopt(
        "n",
        "generate",
        "cluster COUNT random points instead of reading them",
        "COUNT",
    );
    options.optopt(
        "r",
        "radius",
        "radius of generated points (default: 20)",
        "RADIUS",
    );
    options.optopt("s", "seed", "random seed (default: from the clock)", "SEED");
    options.optopt(
        "f",
        "format",
        "write the result as points, eps or svg (default: nothing)",
        "FORMAT",
    );
    options.optopt(
        "",
        "tolerance",
        "fraction of points allowed to move in the last iteration (default: 0.0001)",
        "RATIO",
    );
    options.optopt(
        "",
        "max-iter",
        "maximum number of iterations (default: 1000)",
        "COUNT",
    );
    options.optflag(
        "",
        "reseed",
        "move empty clusters onto random points (by default an emptied cluster stays dead, \
         so fewer than COUNT clusters often survive)",
    );
    options.optflag("v", "verbose", "print diagnostic data");

    let matches = lloyd_tools::parse_args(options, USAGE, 2)?;
    let _chrome_trace_guard = lloyd_tools::init_tracing(&matches);

    let seed: u64 = matches
        .opt_get_default::<u64>("s", lloyd_tools::generate::clock_seed())
        .context("invalid value for option 'seed'")?;
    let mut rng = rand_pcg::Pcg64::seed_from_u64(seed);

    let mut points = match matches
        .opt_get::<usize>("n")
        .context("invalid value for option 'generate'")?
    {
        Some(count) => {
            let radius: f64 = matches
                .opt_get_default::<f64>("r", 20.0)
                .context("invalid value for option 'radius'")?;
            let radius = lloyd_tools::generate::check_radius(radius)?;
            lloyd_tools::generate::disc(&mut rng, count, radius)
        }
        None => {
            let input = lloyd_tools::reader(matches.free.first())?;
            lloyd_tools::points::read(input).context("failed to read points")?
        }
    };

    let mut k_means = KMeans::new(
        rng,
        matches
            .opt_get_default::<usize>("k", 5)
            .context("invalid value for option 'clusters'")?,
    );
    if let Some(tolerance) = matches
        .opt_get::<f64>("tolerance")
        .context("invalid value for option 'tolerance'")?
    {
        k_means.tolerance = tolerance;
    }
    if let Some(max_iter) = matches
        .opt_get::<usize>("max-iter")
        .context("invalid value for option 'max-iter'")?
    {
        k_means.max_iter = max_iter;
    }
    if matches.opt_present("reseed") {
        k_means.empty_clusters = EmptyClusters::Reseed;
    }
    let format: Option<Format> = matches
        .opt_get::<Format>("f")
        .context("invalid value for option 'format'")?;

    tracing::info!(
        point_count = points.len(),
        cluster_count = k_means.cluster_count,
        seed,
        "clustering"
    );

    let start = Instant::now();
    let metadata = k_means
        .run(&mut points)
        .context("failed to cluster points")?;
    let elapsed = start.elapsed();

    eprintln!("k-means: {:.6} seconds", elapsed.as_secs_f64());
    if matches.opt_present("v") {
        eprintln!(
            "iterations: {}, converged: {}",
            metadata.iteration_count, metadata.converged,
        );
        for (group, centroid) in metadata.centroids.iter().enumerate() {
            eprintln!(
                "{group}: ({}, {}) x{}",
                centroid.position.x, centroid.position.y, centroid.count,
            );
        }
    }

    let Some(format) = format else {
        return Ok(());
    };
    let output = lloyd_tools::writer(matches.free.get(1))?;
    match format {
        Format::Points => lloyd_tools::points::write(output, &points, true)?,
        Format::Eps => lloyd_tools::render::write_eps(output, &points, &metadata.centroids)?,
        Format::Svg => lloyd_tools::render::write_svg(output, &points, &metadata.centroids)?,
    }

    Ok(())
}
