//! The labeling session: which image is in view, its working angle, and the
//! transitions that move between images and commit labels.

use std::path::PathBuf;

use image::RgbImage;

use crate::error::{LabelerError, Result};
use crate::imaging::{self, GuideLines};
use crate::settings::Settings;
use crate::store::{self, DatasetLayout, ImageEntry};

/// Input from whatever front end drives the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Commit the current label and bookmark, then move forward.
    Next,
    /// Move back without committing anything.
    Previous,
    SetAngle(f32),
    /// Pointer at `x` on a gauge `width` pixels wide.
    GaugeAt { x: f32, width: f32 },
}

/// Everything a front end needs to draw one frame.
#[derive(Clone, Debug)]
pub struct Preview {
    pub image: RgbImage,
    pub guides: GuideLines,
    /// Gauge cursor position, 0.0 at `-max_angle` to 1.0 at `+max_angle`.
    pub gauge_fraction: f64,
    pub status: String,
}

/// Clamp `angle` into `[-max_angle, max_angle]`. The sign of `max_angle` is
/// ignored.
pub fn clamp_angle(angle: f32, max_angle: f32) -> f32 {
    let max_angle = max_angle.abs();
    angle.clamp(-max_angle, max_angle)
}

pub struct Session {
    layout: DatasetLayout,
    bookmark_path: PathBuf,
    settings: Settings,
    entries: Vec<ImageEntry>,
    cursor: usize,
    angle: f32,
    /// Letterboxed, unrotated pixels of the current entry.
    canvas: RgbImage,
}

impl Session {
    /// List the dataset, resume from the bookmark and load the first entry.
    pub fn open(
        layout: DatasetLayout,
        bookmark_path: impl Into<PathBuf>,
        settings: Settings,
    ) -> Result<Self> {
        settings.validate()?;
        let bookmark_path = bookmark_path.into();
        let entries = store::list_entries(&layout.images_dir)?;
        if entries.is_empty() {
            return Err(LabelerError::EmptyDataset(layout.images_dir.clone()));
        }
        log::info!(
            "found {} images in {}",
            entries.len(),
            layout.images_dir.display()
        );

        let bookmark = store::load_bookmark(&bookmark_path)?;
        let cursor = store::resolve_initial_cursor(&entries, bookmark.as_deref());
        match &bookmark {
            Some(id) if entries[cursor].id == *id => log::info!("resuming at {id}"),
            Some(id) => log::info!("bookmark {id} not in dataset, starting at the first image"),
            None => {}
        }

        let (canvas, angle) = load_entry(&layout, &entries[cursor], &settings)?;
        Ok(Self {
            layout,
            bookmark_path,
            settings,
            entries,
            cursor,
            angle,
            canvas,
        })
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Next => self.advance(),
            Command::Previous => self.retreat(),
            Command::SetAngle(angle) => {
                self.set_angle(angle);
                Ok(())
            }
            Command::GaugeAt { x, width } => {
                self.set_angle_from_gauge(x, width);
                Ok(())
            }
        }
    }

    /// Set the working angle, clamped to the gauge range. Returns the angle
    /// actually applied.
    pub fn set_angle(&mut self, angle: f32) -> f32 {
        if angle.is_nan() {
            log::warn!("ignoring NaN angle");
            return self.angle;
        }
        self.angle = clamp_angle(angle, self.settings.max_angle);
        self.angle
    }

    pub fn set_angle_from_gauge(&mut self, x: f32, width: f32) -> f32 {
        self.set_angle(imaging::gauge_angle(x, width, self.settings.max_angle))
    }

    /// Save the label and bookmark for the current entry, then step forward
    /// unless this is the last one.
    pub fn advance(&mut self) -> Result<()> {
        let id = self.current().id.clone();
        store::save_label(&self.layout.labels_dir, &id, self.angle)?;
        store::save_bookmark(&self.bookmark_path, &id)?;

        if self.cursor + 1 < self.entries.len() {
            self.go_to(self.cursor + 1)
        } else {
            log::debug!("{id} is the last image, staying");
            Ok(())
        }
    }

    /// Step back without saving anything for the entry being left.
    pub fn retreat(&mut self) -> Result<()> {
        if self.cursor == 0 {
            log::debug!("already at the first image");
            return Ok(());
        }
        self.go_to(self.cursor - 1)
    }

    fn go_to(&mut self, index: usize) -> Result<()> {
        let (canvas, angle) = load_entry(&self.layout, &self.entries[index], &self.settings)?;
        self.cursor = index;
        self.canvas = canvas;
        self.angle = angle;
        log::debug!("now at {} (angle {})", self.current().id, self.angle);
        Ok(())
    }

    pub fn preview(&self) -> Preview {
        Preview {
            image: imaging::rotate(&self.canvas, self.angle),
            guides: GuideLines {
                interval: self.settings.grid_interval,
                extent: self.settings.img_size,
            },
            gauge_fraction: imaging::gauge_fraction(self.angle, self.settings.max_angle),
            status: self.status(),
        }
    }

    pub fn status(&self) -> String {
        format!(
            "{} / {} - {}",
            self.cursor + 1,
            self.entries.len(),
            self.current().id
        )
    }

    pub fn current(&self) -> &ImageEntry {
        &self.entries[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Decode and letterbox `entry`, and read back its saved angle (0 when it
/// has never been labeled).
fn load_entry(
    layout: &DatasetLayout,
    entry: &ImageEntry,
    settings: &Settings,
) -> Result<(RgbImage, f32)> {
    let decoded = imaging::decode(&entry.path)?;
    let canvas = imaging::letterbox(&decoded, settings.img_size);

    let angle = match store::load_label(&layout.labels_dir, &entry.id)? {
        Some(saved) => {
            let clamped = clamp_angle(saved, settings.max_angle);
            if clamped != saved {
                log::warn!(
                    "{}: saved angle {saved} outside ±{}, using {clamped}",
                    entry.id,
                    settings.max_angle
                );
            }
            clamped
        }
        None => 0.0,
    };
    Ok((canvas, angle))
}
