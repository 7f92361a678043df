use argh::FromArgs;
use birdseye::{DomainWarning, PixelPoint, RigConfig, WorldGrid, WorldPoint};
use serde::Serialize;

/// Projects ground-plane grids into the fisheye images of a surround-view rig
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the rig description
    #[argh(positional, default = "String::from(\"data/surround_rig.json\")")]
    config: String,

    /// only project the grid of this view
    #[argh(option, short = 'v')]
    view: Option<String>,

    /// grid spacing in world units
    #[argh(option, short = 's', default = "50.0")]
    step: f64,
}

#[derive(Serialize)]
struct GridSample<'a> {
    view: &'a str,
    world: WorldPoint,
    pixel: PixelPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<DomainWarning>,
}

// the ground area covered by each camera of the reference rig
fn grid_bounds(view: &str) -> Option<((f64, f64), (f64, f64))> {
    match view {
        "front" => Some(((-300.0, 300.0), (0.0, 1000.0))),
        "back" => Some(((-300.0, 300.0), (-1500.0, -500.0))),
        "left" => Some(((-300.0, -100.0), (-500.0, 0.0))),
        "right" => Some(((100.0, 300.0), (-500.0, 0.0))),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let rig = RigConfig::from_file(&args.config)?.calibrate()?;
    for failure in &rig.failures {
        log::error!("{failure}");
    }

    let views = match &args.view {
        Some(view) => vec![view.as_str()],
        None => rig.mapper.view_names().collect(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for view in views {
        let Some(((x0, x1), (y0, y1))) = grid_bounds(view) else {
            log::warn!("no grid defined for view `{view}`");
            continue;
        };
        let grid = WorldGrid::new(x0..=x1, y0..=y1, args.step).ok_or("invalid grid step")?;

        let mut warnings = 0;
        for world in &grid {
            let projection = rig.mapper.world_to_fisheye_checked(view, world)?;
            if projection.warning.is_some() {
                warnings += 1;
            }
            let sample = GridSample {
                view,
                world,
                pixel: projection.point,
                warning: projection.warning,
            };
            serde_json::to_writer(&mut out, &sample)?;
            std::io::Write::write_all(&mut out, b"\n")?;
        }

        log::info!(
            "projected {} points into view `{view}`, {warnings} with warnings",
            grid.len()
        );
    }

    Ok(())
}
