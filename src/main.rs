mod cli;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use winit::event_loop::EventLoop;

use comix::FileHandler;

use crate::cli::Cli;
use crate::ui::state::{StatusLine, ViewerState};
use crate::ui::App;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Status messages from the file handler end up in the window title.
    let status: StatusLine = Rc::new(RefCell::new(None));
    let sink = {
        let status = Rc::clone(&status);
        move |message: String| *status.borrow_mut() = Some(message)
    };

    let mut handler = match FileHandler::with_status(cli.preferences(), sink) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };
    if !handler.open_file(&cli.path, cli.page) {
        if let Some(message) = status.borrow().as_deref() {
            log::error!("{}", message);
        }
        handler.cleanup();
        std::process::exit(1);
    }
    handler.do_caching();

    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => {
            log::error!("Cannot create event loop: {}", e);
            handler.cleanup();
            std::process::exit(1);
        }
    };

    let mut app = App::new(ViewerState::new(handler, status));
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
    }
    app.state.handler.cleanup();
}
