use std::path::PathBuf;

use clap::Parser;
use svg::{
    node::element::{path::Data, Path},
    Document,
};

use slopeladder::{
    generators, AlignConfig, IsolineStack, Metric, ScoreFunction, Simplifier, SimplifyConfig,
};

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum Example {
    Rings,
    Lines,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum Score {
    SymmetricDifference,
    Hausdorff,
}

#[derive(Parser)]
struct Cli {
    #[arg(long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "rings")]
    example: Example,

    /// The number of isolines.
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// The number of vertices per isoline.
    #[arg(long, default_value_t = 120)]
    len: usize,

    /// The fraction of vertices to keep.
    #[arg(long, default_value_t = 0.3)]
    keep: f64,

    #[arg(long)]
    singletons: bool,

    #[arg(long)]
    geodesic: bool,

    #[arg(long, value_enum, default_value = "symmetric-difference")]
    score: Score,
}

fn draw(mut doc: Document, stack: &IsolineStack, color: &str, stroke_width: f64) -> Document {
    for iso in &stack.isolines {
        let Some(p) = iso.points.first() else {
            continue;
        };
        let mut data = Data::new().move_to((p.x, p.y));
        for p in &iso.points[1..] {
            data = data.line_to((p.x, p.y));
        }
        if iso.cyclic {
            data = data.close();
        }
        let path = Path::new()
            .set("stroke", color)
            .set("stroke-width", stroke_width)
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round")
            .set("fill", "none")
            .set("d", data);
        doc = doc.add(path);
    }
    doc
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Cli::parse();

    let stack = match args.example {
        Example::Rings => generators::nested_rings(args.count, args.len, 3.0),
        Example::Lines => generators::parallel_lines(args.count, args.len, 5.0, 2.0),
    };

    let align_config = AlignConfig {
        metric: if args.geodesic {
            Metric::Geodesic
        } else {
            Metric::Euclidean
        },
        ..AlignConfig::default()
    };
    let alignment = slopeladder::align(&stack, &align_config)?;

    let config = SimplifyConfig {
        singleton_ladders: args.singletons,
        score: match args.score {
            Score::SymmetricDifference => ScoreFunction::SymmetricDifference,
            Score::Hausdorff => ScoreFunction::Hausdorff,
        },
        ..SimplifyConfig::default()
    };
    let mut simplifier = Simplifier::new(&stack, &alignment, config)?;
    let target = (stack.vertex_count() as f64 * args.keep).round() as usize;
    let steps = simplifier.run_until(target);
    println!(
        "{steps} collapses, {} of {} vertices left",
        simplifier.vertex_count(),
        stack.vertex_count()
    );

    let bbox = stack.bounding_box().unwrap_or_default();
    let pad = 0.05 * bbox.width().max(bbox.height()).max(1.0);
    let stroke_width = bbox.width().max(bbox.height()) / 512.0;
    let mut document = Document::new().set(
        "viewBox",
        (
            bbox.x0 - pad,
            bbox.y0 - pad,
            bbox.width() + 2.0 * pad,
            bbox.height() + 2.0 * pad,
        ),
    );
    document = draw(document, &stack, "#94D2BD", 3.0 * stroke_width);
    document = draw(document, &simplifier.output(), "#9B2226", stroke_width);
    svg::save(&args.output, &document)?;

    Ok(())
}
