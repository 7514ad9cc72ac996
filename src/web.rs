//! Browser front-end. The page owns the 3D scene and exposes a handful of
//! global functions; this module feeds them from the engine.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use log::{error, info};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::events::{Event, Prop};
use crate::grid::HazardKind;
use crate::interpreter::{Stage, Step};
use crate::level::LevelDef;
use crate::levels;
use crate::session::Session;

const CONSOLE_ID: &str = "console-printing";

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_name = robotPose)]
	fn robot_pose(x: f64, z: f64, yaw_degrees: f64);

	#[wasm_bindgen(js_name = propVisibility)]
	fn prop_visibility(kind: &str, id: u32, visible: bool);

	#[wasm_bindgen(js_name = extinguishers)]
	fn extinguishers(remaining: u32);

	#[wasm_bindgen(js_name = finished)]
	fn finished(won: bool);
}

pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'&' => out.push_str("&amp;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(c),
		}
	}
	out
}

fn window() -> Option<web_sys::Window> {
	web_sys::window()
}

fn print_on_console(text: &str) {
	let Some(element) = window().and_then(|w| w.document()).and_then(|d| d.get_element_by_id(CONSOLE_ID)) else {
		error!("no #{CONSOLE_ID} element for: {text}");
		return;
	};
	let html = element.inner_html();
	element.set_inner_html(&format!("{html}{}<br>", escape_html(text)));
}

// ---------------------------------------------------------------------------
// Page stage
// ---------------------------------------------------------------------------

struct Page;

impl Stage for Page {
	fn render(&mut self, events: Vec<Event>) {
		for event in events {
			match event {
				Event::Console(line) => print_on_console(&line.text),
				Event::Pose { position, yaw } => robot_pose(position.x, position.z, yaw),
				Event::Visibility { prop, visible } => {
					let (kind, id) = match prop {
						Prop::Crystal(id) => ("crystal", id),
						Prop::Hazard(HazardKind::Hole, id) => ("hole", id),
						Prop::Hazard(HazardKind::FireHole, id) => ("fireHole", id),
					};
					prop_visibility(kind, id as u32, visible);
				},
				Event::Extinguishers(n) => extinguishers(n),
				Event::Finished { won } => finished(won),
			}
		}
	}

	fn next_frame(&mut self) -> LocalBoxFuture<'static, ()> {
		let (tx, rx) = oneshot::channel::<()>();
		let callback = Closure::once_into_js(move || {
			let _ = tx.send(());
		});
		match window() {
			Some(w) => {
				if let Err(e) = w.request_animation_frame(callback.unchecked_ref()) {
					error!("requestAnimationFrame failed: {e:?}");
				}
			},
			None => error!("no global `window`"),
		}
		async move {
			// A dropped sender just means the frame never came.
			let _ = rx.await;
		}
		.boxed_local()
	}
}

// ---------------------------------------------------------------------------
// Exported game handle
// ---------------------------------------------------------------------------

fn lookup(level_id: &str) -> anyhow::Result<LevelDef> {
	levels::builtin(level_id).ok_or_else(|| anyhow!("unknown level '{level_id}', expected one of {:?}", levels::IDS))
}

#[wasm_bindgen]
pub struct Game {
	session: Rc<RefCell<Session>>,
}

#[wasm_bindgen]
impl Game {
	#[wasm_bindgen(constructor)]
	pub fn new(level_id: &str) -> Result<Game, JsError> {
		let def = lookup(level_id).map_err(|e| JsError::new(&e.to_string()))?;
		info!("loading {} ({})", def.id, def.title);
		let session = Session::new(def);
		Ok(Game {
			session: Rc::new(RefCell::new(session)),
		})
	}

	/// Push the starting layout to the page.
	pub fn show(&self) {
		let mut events = Vec::new();
		self.session.borrow_mut().level_mut().reset(&mut events);
		Page.render(events);
	}

	/// Validate and run `code`. Errors go to the console; a second press
	/// while running is ignored.
	pub fn execute(&self, code: String) {
		spawn_local(run(self.session.clone(), code));
	}

	pub fn reset(&self) {
		let mut events = Vec::new();
		self.session.borrow_mut().reset(&mut events);
		Page.render(events);
	}

	/// Called by the page's fire timer.
	pub fn alternate(&self) {
		let mut events = Vec::new();
		self.session.borrow_mut().alternate_hazards(&mut events);
		Page.render(events);
	}

	#[wasm_bindgen(js_name = isRunning)]
	pub fn is_running(&self) -> bool {
		self.session.borrow().is_running()
	}
}

// The session is only borrowed between frames, so `reset` can land while a
// run is waiting for the next one.
async fn run(session: Rc<RefCell<Session>>, code: String) {
	let mut page = Page;
	let mut events = Vec::new();
	let started = session.borrow_mut().start(&code, &mut events);
	page.render(std::mem::take(&mut events));
	let mut interpreter = match started {
		Ok(interpreter) => interpreter,
		Err(e) => {
			info!("not running: {e}");
			return;
		},
	};

	loop {
		let step = interpreter.tick(session.borrow_mut().level_mut(), &mut events);
		page.render(std::mem::take(&mut events));
		match step {
			Step::Running => page.next_frame().await,
			Step::Done(end) => {
				let report = session.borrow_mut().finish(&interpreter, end, &mut events);
				page.render(events);
				info!("run report: {report:?}");
				return;
			},
		}
	}
}
