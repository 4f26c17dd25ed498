//! Renders a volume in every mode and writes the frames as PNG files.
//!
//! Usage: `cargo run --example render_demo -- [volume.fld|volume.dat] [output_dir]`
//!
//! Without a volume path a synthetic sphere is rendered. Set `RUST_LOG=debug` to see rebuild
//! and frame timings.

use std::path::PathBuf;

use volvis::*;

fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let input = args.next();
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let config = RenderConfig::new()
        .with_interpolation(InterpolationMode::Linear)
        .with_iso_value(128.0)
        .with_shading(true)
        .with_bricking(true, 16)
        .with_skipping(true, 8);

    let mut driver = match input {
        Some(path) => RenderDriver::from_file(path, config)?,
        None => {
            let volume = Phantom::Sphere.generate(UVec3::splat(96), 255.0)?;
            RenderDriver::new(volume, config)?
        }
    };

    // Fit the transfer function to the loaded data
    let volume = driver.volume();
    let tf = TransferFunction::from_color_map(&ColorMap::viridis())
        .fitted_to(volume.minimum(), volume.maximum());
    let iso = 0.5 * (volume.minimum() + volume.maximum());
    let config = driver.config().clone().with_transfer_function(tf).with_iso_value(iso);
    driver.set_config(config)?;

    let mut camera = Camera::framing(driver.volume().dims().as_vec3(), 4.0 / 3.0);
    camera.orbit(0.6, 0.3);

    for mode in [
        RenderMode::Slicer,
        RenderMode::Mip,
        RenderMode::Isosurface,
        RenderMode::Composite,
    ] {
        driver.set_config(driver.config().clone().with_render_mode(mode))?;
        let image = driver.render(&camera, 400, 300);
        let path = output_dir.join(format!("volvis_{}.png", mode.name().to_lowercase()));
        if let Err(err) = image.save_image(&path) {
            log::error!("could not write {}: {err}", path.display());
        }
    }

    let snapshot = driver.bricks().snapshot();
    println!(
        "{} of {} bricks resident, {} of {} blocks active",
        snapshot.active_bricks,
        snapshot.index.len(),
        driver.blocks().active_count(),
        driver.blocks().blocks().len()
    );
    Ok(())
}
