//! Native host for the archviz viewer: an eframe window with a toolbar, a
//! floor status panel, a collapsible model browser and the 3D viewport.

mod app;

fn main() {
    app::run();
}
