use std::cell::RefCell;
use std::rc::Rc;

use eframe::egui;

use crate::error::LabelerError;
use crate::imaging::{self, GuideLines};
use crate::session::{Command, Preview, Session};

pub const TITLE: &str = "Rotate Labeling Tool";

const GAUGE_HEIGHT: f32 = 50.0;
const TRACK_TOP: f32 = 20.0;
const TRACK_BOTTOM: f32 = 30.0;

/// Where the app leaves the error that made it close the window.
pub type FatalSlot = Rc<RefCell<Option<LabelerError>>>;

// ── App ─────────────────────────────────────────────────────────────────────

pub struct RotateApp {
    session: Session,
    texture: Option<egui::TextureHandle>,
    // (cursor, angle) the texture was built from
    shown: Option<(usize, f32)>,
    // render request minus the pixels, which live in `texture`
    guides: GuideLines,
    gauge_fraction: f64,
    status: String,
    fatal: FatalSlot,
}

impl RotateApp {
    pub fn new(session: Session, fatal: FatalSlot) -> Self {
        let settings = *session.settings();
        Self {
            session,
            texture: None,
            shown: None,
            guides: GuideLines {
                interval: settings.grid_interval,
                extent: settings.img_size,
            },
            gauge_fraction: 0.5,
            status: String::new(),
            fatal,
        }
    }

    fn dispatch(&mut self, ctx: &egui::Context, command: Command) {
        if self.fatal.borrow().is_some() {
            return;
        }
        if let Err(err) = self.session.apply(command) {
            log::error!("{err}");
            *self.fatal.borrow_mut() = Some(err);
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    /// Fetch a new render request when the image or angle changed.
    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let key = (self.session.cursor(), self.session.angle());
        if self.texture.is_some() && self.shown == Some(key) {
            return;
        }
        let Preview {
            image,
            guides,
            gauge_fraction,
            status,
        } = self.session.preview();
        let size = [
            image.width() as usize,
            image.height() as usize,
        ];
        let color_image = egui::ColorImage::from_rgb(size, image.as_raw());
        if let Some(tex) = self.texture.as_mut() {
            tex.set(color_image, egui::TextureOptions::LINEAR);
        } else {
            self.texture =
                Some(ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR));
        }
        self.guides = guides;
        self.gauge_fraction = gauge_fraction;
        self.status = status;
        self.shown = Some(key);
    }

    fn gauge(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), GAUGE_HEIGHT),
            egui::Sense::click_and_drag(),
        );
        let rect = response.rect;

        // press and drag both set the angle
        if response.is_pointer_button_down_on() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.dispatch(
                    ui.ctx(),
                    Command::GaugeAt {
                        x: pos.x - rect.left(),
                        width: rect.width(),
                    },
                );
                self.ensure_texture(ui.ctx());
            }
        }

        painter.rect_filled(rect, 0.0, egui::Color32::LIGHT_GRAY);
        let track = egui::Rect::from_min_max(
            egui::pos2(rect.left(), rect.top() + TRACK_TOP),
            egui::pos2(rect.right(), rect.top() + TRACK_BOTTOM),
        );
        painter.rect_filled(track, 0.0, egui::Color32::WHITE);
        painter.rect_stroke(
            track,
            0.0,
            egui::Stroke::new(1.0, egui::Color32::BLACK),
            egui::StrokeKind::Middle,
        );

        let x = rect.left() + imaging::gauge_offset(self.gauge_fraction, rect.width());
        painter.line_segment(
            [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
            egui::Stroke::new(3.0, egui::Color32::RED),
        );
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        self.ensure_texture(ui.ctx());

        let side = self.session.settings().img_size as f32;
        let (response, painter) = ui.allocate_painter(egui::vec2(side, side), egui::Sense::hover());
        let rect = response.rect;

        if let Some(ref tex) = self.texture {
            painter.image(
                tex.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        let stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
        for offset in self.guides.positions() {
            let offset = offset as f32;
            let vertical = [
                egui::pos2(rect.left() + offset, rect.top()),
                egui::pos2(rect.left() + offset, rect.bottom()),
            ];
            let horizontal = [
                egui::pos2(rect.left(), rect.top() + offset),
                egui::pos2(rect.right(), rect.top() + offset),
            ];
            painter.extend(egui::Shape::dashed_line(&vertical, stroke, 2.0, 2.0));
            painter.extend(egui::Shape::dashed_line(&horizontal, stroke, 2.0, 2.0));
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for RotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (next, previous) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::ArrowLeft),
            )
        });
        if next {
            self.dispatch(ctx, Command::Next);
        } else if previous {
            self.dispatch(ctx, Command::Previous);
        }
        self.ensure_texture(ctx);

        // Bottom panels stack upwards: status last, gauge above it
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(&self.status);
            });
        });

        egui::TopBottomPanel::bottom("gauge")
            .exact_height(GAUGE_HEIGHT)
            .show(ctx, |ui| self.gauge(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| self.canvas(ui));
        });
    }
}
