mod input;
mod panels;
mod timing;

use archviz::assets::{DecodeWorker, GltfDecoder, ModelSource};
use archviz::config::ViewerConfig;
use archviz::render::pick::SurfaceRect;
use archviz::render::RenderSurface;
use archviz::scene::floors::FloorCatalog;
use archviz::viewer::{Viewer, ViewerError, ViewerParts};
use input::InputState;
use panels::{Panels, UiAction};
use timing::FrameTiming;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const TITLE: &str = "archviz";
const READING_TEXT: &str = "Reading file...";
const READ_ERROR_TEXT: &str = "Error reading file (see log).";

/// Command line: `archviz [MODEL] [--floors FLOORS.json] [--config CONFIG.json]`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Args {
    pub model: Option<String>,
    pub floors: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--floors" => parsed.floors = args.next().map(PathBuf::from),
                "--config" => parsed.config = args.next().map(PathBuf::from),
                _ if parsed.model.is_none() && !arg.starts_with("--") => parsed.model = Some(arg),
                _ => log::warn!("Ignoring argument '{}'", arg),
            }
        }
        parsed
    }
}

/// A picked model file. The reading text is shown for one frame before the
/// file is opened and handed to the viewer.
#[derive(Debug, Default)]
struct PendingOpen(Option<PathBuf>);

impl PendingOpen {
    fn begin(&mut self, path: PathBuf, panels: &Panels) {
        panels.set_loader(Some(READING_TEXT));
        self.0 = Some(path);
    }

    fn resolve(&mut self, panels: &Panels) -> Option<ModelSource> {
        let path = self.0.take()?;
        match std::fs::File::open(&path).and_then(|file| file.metadata()) {
            Ok(meta) if meta.is_file() => Some(ModelSource::Path(path)),
            Ok(_) => {
                log::warn!("{} is not a file", path.display());
                panels.set_loader(Some(READ_ERROR_TEXT));
                None
            }
            Err(err) => {
                log::warn!("Failed to read {}: {}", path.display(), err);
                panels.set_loader(Some(READ_ERROR_TEXT));
                None
            }
        }
    }
}

pub struct ViewerApp {
    viewer: Viewer,
    panels: Panels,
    pending_open: PendingOpen,
    texture: Option<egui::TextureHandle>,
    input: InputState,
    timing: FrameTiming,
}

impl ViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, args: Args) -> Result<Self, ViewerError> {
        let config = match &args.config {
            Some(path) => ViewerConfig::load(path).unwrap_or_else(|err| {
                log::warn!("Failed to load config {}: {}", path.display(), err);
                ViewerConfig::default()
            }),
            None => ViewerConfig::default(),
        };
        let floors = match &args.floors {
            Some(path) => FloorCatalog::load(path).unwrap_or_else(|err| {
                log::warn!("Failed to load floors {}: {}", path.display(), err);
                FloorCatalog::default()
            }),
            None => FloorCatalog::default(),
        };
        log::info!("{} floor records", floors.records().len());

        let ctx = cc.egui_ctx.clone();
        let loader = DecodeWorker::new(Arc::new(GltfDecoder::new()))
            .with_waker(move || ctx.request_repaint());
        let panels = Panels::default();
        let mut viewer = Viewer::new(ViewerParts {
            surface: Some(RenderSurface::software(
                960.0,
                640.0,
                cc.egui_ctx.pixels_per_point(),
            )),
            loader: Box::new(loader),
            ports: panels.ports(),
            config,
            floors,
        })?;

        if let Some(model) = &args.model {
            viewer.load_model(ModelSource::parse(model));
        }

        Ok(Self {
            viewer,
            panels,
            pending_open: PendingOpen::default(),
            texture: None,
            input: InputState::default(),
            timing: FrameTiming::new(TITLE.to_string()),
        })
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::OpenModel => self.open_model(),
            UiAction::ResetView => {
                let outcome = self.viewer.reset_view();
                log::debug!("Reset view: {:?}", outcome);
            }
            UiAction::SetMode(mode) => self.viewer.set_mode(mode),
            UiAction::Screenshot => self.save_screenshot(),
            UiAction::ToggleBrowser => {
                self.viewer.toggle_browser_panel();
            }
            UiAction::ToggleVisibility(node) => {
                self.viewer.toggle_visibility(node);
            }
            UiAction::Focus(node) => {
                self.viewer.focus_node(node);
            }
        }
    }

    fn open_model(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("glTF", &["glb", "gltf"])
            .pick_file()
        else {
            return;
        };
        self.pending_open.begin(path, &self.panels);
    }

    fn save_screenshot(&mut self) {
        let png = match self.viewer.capture_screenshot() {
            Ok(png) => png,
            Err(err) => {
                log::warn!("Screenshot failed: {}", err);
                return;
            }
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(self.viewer.config().screenshot_name.as_str())
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, png) {
            Ok(()) => log::info!("Screenshot written to {}", path.display()),
            Err(err) => log::warn!("Failed to write {}: {}", path.display(), err),
        }
    }

    fn viewport(&mut self, ui: &mut egui::Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let surface = SurfaceRect {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        };
        self.viewer.on_resize(surface, ui.ctx().pixels_per_point());

        for (button, delta) in input::drags(&response) {
            self.viewer.pointer_drag(button, delta);
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll.abs() > 0.1 {
                self.viewer.wheel(-scroll);
            }
        }
        let hover = response.hover_pos();
        if self.input.handle_hover(hover.is_some()) {
            self.viewer.pointer_leave();
        }
        if let Some(pos) = hover {
            self.viewer.pointer_move(pos.x, pos.y);
        }

        let started = Instant::now();
        self.viewer.tick();
        self.timing
            .set_render_ms(started.elapsed().as_secs_f32() * 1000.0);

        let pixels = self.viewer.surface().pixels();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [pixels.width as usize, pixels.height as usize],
            pixels.rgba,
        );
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ui.ctx().load_texture(
                    "viewport",
                    image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }
        let Some(texture) = &self.texture else {
            return;
        };
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        ui.painter()
            .image(texture.id(), rect, uv, egui::Color32::WHITE);

        if let Some(text) = &self.panels.state().loader {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(18.0),
                egui::Color32::DARK_GRAY,
            );
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(title) = self.timing.update(Instant::now()) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
        }
        if let Some(source) = self.pending_open.resolve(&self.panels) {
            self.viewer.load_model(source);
        }

        let mut actions = Vec::new();
        {
            let state = self.panels.state();
            egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
                panels::toolbar(ui, &state, &mut actions);
            });
            egui::SidePanel::right("floors")
                .default_width(280.0)
                .show(ctx, |ui| panels::floor_panel(ui, &state));
            if state.browser_open {
                egui::SidePanel::left("browser")
                    .default_width(240.0)
                    .show(ctx, |ui| panels::browser_panel(ui, &state, &mut actions));
            }
        }
        for action in actions {
            self.apply(action);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::default())
            .show(ctx, |ui| self.viewport(ui));

        // frame loop: keep ticking for damping and background decodes
        ctx.request_repaint();
    }
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1));
    log::info!("Starting {} {:?}", TITLE, args);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITLE)
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };
    let result = eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| match ViewerApp::new(cc, args) {
            Ok(app) => Ok(Box::new(app) as Box<dyn eframe::App>),
            Err(err) => Err(err.to_string().into()),
        }),
    );
    if let Err(err) = result {
        log::error!("Viewer exited with error: {}", err);
    }
}
