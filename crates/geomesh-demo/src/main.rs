//! Meshes a plate with a circular hole and logs a summary
//!
//! An optional first argument names a RON file with session options.

use std::error::Error;

use geomesh::{
    BoundaryLayer, CircleOptions, Dim, FieldAggregate, Geo, Geometry, MeshOptions, SessionOptions,
    default_kernel,
};
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geomesh=debug,geomesh_demo=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "Loading session options");
            SessionOptions::load(path)?
        }
        None => SessionOptions::named("plate"),
    };

    let mut geom = Geometry::<Geo>::open(default_kernel(), options)?;

    let hole = geom.add_circle(
        [1.0, 0.5],
        0.2,
        Some(0.05),
        CircleOptions {
            num_sections: 4,
            make_surface: false,
            ..CircleOptions::default()
        },
    )?;
    let plate = geom.add_rectangle(0.0, 2.0, 0.0, 1.0, 0.0, 0.1, &[&hole], true)?;

    let layer = geom.add_boundary_layer(
        BoundaryLayer::new(0.02, 0.1, 0.05, 0.4)
            .with_curves(&hole.arcs)
            .with_sampling(50),
    )?;
    geom.set_background_mesh(&[layer], FieldAggregate::Min)?;

    if let Some(surface) = &plate.surface {
        geom.add_physical(surface, Some("plate"))?;
    }
    geom.add_physical(&hole.arcs, Some("hole"))?;
    geom.add_physical(&plate.curves, Some("outer"))?;

    let mut mesh = geom.generate_mesh(&MeshOptions::with_dim(Dim::Surface))?;
    info!(
        points = mesh.points.len(),
        triangles = mesh.num_cells(Dim::Surface),
        edges = mesh.num_cells(Dim::Curve),
        area = mesh.measure(Dim::Surface),
        "Mesh generated"
    );

    mesh.prune_lower_dimensions();
    for (label, blocks) in &mesh.cell_sets {
        let cells: usize = blocks.iter().map(Vec::len).sum();
        info!(%label, cells, "Cell set");
    }

    geom.close()?;
    Ok(())
}
