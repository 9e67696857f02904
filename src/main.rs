use std::path::PathBuf;

use anyhow::Context;
use eframe::egui;
use rotate_labeler::app::{FatalSlot, RotateApp, TITLE};
use rotate_labeler::settings::{self, Settings};
use rotate_labeler::{DatasetLayout, Session};

/// Dataset root from the first argument, or from a folder picker.
fn dataset_root() -> Option<PathBuf> {
    if let Some(arg) = std::env::args_os().nth(1) {
        return Some(PathBuf::from(arg));
    }
    rfd::FileDialog::new()
        .set_title("Select Dataset Folder")
        .pick_folder()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(root) = dataset_root() else {
        log::info!("no dataset selected");
        return Ok(());
    };

    let config = Settings::from_env();
    let bookmark = settings::bookmark_path().context("cannot resolve working directory")?;
    let layout = DatasetLayout::open(root)?;
    let session = Session::open(layout, bookmark, config)?;

    let side = config.img_size as f32;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([side + 16.0, side + 110.0])
            .with_title(TITLE),
        ..Default::default()
    };

    let fatal = FatalSlot::default();
    let slot = fatal.clone();
    eframe::run_native(
        TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(RotateApp::new(session, slot)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run eframe: {e}"))?;

    let failure = fatal.borrow_mut().take();
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
