use anyhow::{Context, Result, bail};
use futures::FutureExt;
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use gridbot::events::{Event, Severity};
use gridbot::{RunError, Session, Stage, levels};
use log::{debug, info};
use std::{env, fs, process};

const USAGE: &str = "Usage: gridbot <level-id> <program-file>\n       gridbot --list";

/// Headless stage: console lines go to stdout, everything else to the log.
#[derive(Default)]
struct Terminal {
	frames: u64,
}

impl Stage for Terminal {
	fn render(&mut self, events: Vec<Event>) {
		for event in events {
			match event {
				Event::Console(line) => match line.severity {
					Severity::Info => println!("{}", line.text),
					Severity::Warning | Severity::Error => eprintln!("{}", line.text),
				},
				Event::Pose { position, yaw } => debug!("frame {}: ({:.2}, {:.2}) yaw {yaw:.0}", self.frames, position.x, position.z),
				Event::Visibility { prop, visible } => info!("{prop:?} visible: {visible}"),
				Event::Extinguishers(n) => info!("extinguishers left: {n}"),
				Event::Finished { won } => debug!("finished, won: {won}"),
			}
		}
	}

	fn next_frame(&mut self) -> LocalBoxFuture<'static, ()> {
		self.frames += 1;
		futures::future::ready(()).boxed_local()
	}
}

fn list() -> Result<()> {
	for id in levels::IDS {
		let def = levels::builtin(id).with_context(|| format!("level table is missing {id}"))?;
		println!("{id:<16} {}", def.title);
	}
	Ok(())
}

fn main() -> Result<()> {
	gridbot::init_logging();

	let mut args = env::args().skip(1);
	let level_id = args.next().context(USAGE)?;
	if level_id == "--list" {
		return list();
	}
	let filename = args.next().context(USAGE)?;

	let def = levels::builtin(&level_id).with_context(|| format!("unknown level '{level_id}' (try --list)"))?;
	let code = fs::read_to_string(&filename).with_context(|| format!("reading {filename}"))?;
	info!("{}: running {filename}", def.title);

	let mut session = Session::new(def);
	let mut stage = Terminal::default();
	let report = match block_on(session.run(&code, &mut stage)) {
		Ok(report) => report,
		Err(RunError::Script(e)) => bail!("program rejected at line {}", e.line()),
		Err(e) => return Err(e.into()),
	};

	println!("{:?} after {} frames", report.end, stage.frames);
	if report.won {
		println!("Fase concluída!");
		Ok(())
	} else {
		println!("Fase não concluída.");
		process::exit(2);
	}
}
