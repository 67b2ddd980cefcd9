use crate::input::{collect_input_nonblocking, map_key, Command};
use crate::logging;
use crate::render::{
    canvas_to_cells, draw_center_box, draw_hud, draw_installation, draw_report, draw_tank_labels,
    layout_bounds, Hud, LayoutMap, Pixel, Terminal, Viewport,
};
use crate::Args;
use anyhow::{Context, Result};
use crossterm::style::Color;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tankflow::clock::Interval;
use tankflow::config::{load_settings, project_paths, save_settings_atomic, Settings};
use tankflow::{FlowController, Report};

const HELP_TEXT: &str = "Four tanks drain down a cascade, one step every 20 ms.\n\
    T1 feeds T2 whenever it holds anything.\n\
    Later tanks only feed on once they are 30% full.\n\
    Each pipe moves at most 0.8 units per step.\n\n\
    Space  start / stop the simulation\n\
    1-4    select a tank\n\
    + / -  fill / empty the selected tank\n\
    t / r  tank view / level report\n\
    c      toggle color\n\n\
    Esc or H to close help.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum View {
    Installation,
    Report,
}

impl View {
    fn name(self) -> &'static str {
        match self {
            View::Installation => "tanks",
            View::Report => "report",
        }
    }
}

/// Everything the front-end knows apart from the terminal itself.
pub(crate) struct Session {
    pub(crate) controller: FlowController,
    pub(crate) report: Report,
    report_clock: Interval,
    pub(crate) view: View,
    pub(crate) show_help: bool,
    pub(crate) selected: usize,
    pub(crate) status: String,
    pub(crate) enable_color: bool,
    pub(crate) settings_dirty: bool,
    pub(crate) should_quit: bool,
}

impl Session {
    pub(crate) fn new(controller: FlowController, settings: &Settings) -> Self {
        let report = Report::capture(&controller);
        Self {
            controller,
            report,
            report_clock: Interval::new(settings.report_interval()),
            view: View::Installation,
            show_help: false,
            selected: 0,
            status: String::new(),
            enable_color: settings.enable_color,
            settings_dirty: false,
            should_quit: false,
        }
    }

    pub(crate) fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::StartStop => {
                let state = if self.controller.start_stop() { "running" } else { "stopped" };
                self.status = format!("simulation {state}");
            }
            Command::SelectTank(i) => match self.controller.tank(i) {
                Ok(t) => {
                    self.selected = i;
                    self.status = format!("{} selected", t.label());
                }
                Err(e) => self.report_error(e),
            },
            Command::FillSelected => match self.controller.fill_tank(self.selected) {
                Ok(()) => self.status = format!("{} filled", self.selected_label()),
                Err(e) => self.report_error(e),
            },
            Command::EmptySelected => match self.controller.empty_tank(self.selected) {
                Ok(()) => self.status = format!("{} emptied", self.selected_label()),
                Err(e) => self.report_error(e),
            },
            Command::ShowInstallation => self.view = View::Installation,
            Command::ShowReport => {
                self.view = View::Report;
                self.refresh_report();
            }
            Command::ToggleColor => {
                self.enable_color = !self.enable_color;
                self.settings_dirty = true;
            }
            Command::HelpToggle => self.show_help = !self.show_help,
            Command::Back => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.view = View::Installation;
                }
            }
            Command::Quit => self.should_quit = true,
        }
    }

    /// Feeds elapsed wall time to the simulation and the report refresh.
    pub(crate) fn advance(&mut self, dt: Duration) {
        self.controller.advance(dt);
        if self.report_clock.advance(dt) > 0 {
            self.refresh_report();
        }
    }

    fn refresh_report(&mut self) {
        self.report = Report::capture(&self.controller);
    }

    fn selected_label(&self) -> &str {
        self.controller
            .tank(self.selected)
            .map(|t| t.label())
            .unwrap_or("?")
    }

    fn report_error(&mut self, e: tankflow::FlowError) {
        log::warn!("{e}");
        self.status = e.to_string();
    }
}

pub(crate) struct App {
    settings: Settings,
    settings_path: PathBuf,
    persist_settings: bool,
    frame_dt: Duration,
    session: Session,
    term: Terminal,
}

impl App {
    fn init(args: &Args) -> Result<Self> {
        let paths = project_paths()?;
        logging::init_file(&paths.log_path)?;

        let settings_path = args.settings.clone().unwrap_or(paths.settings_path);
        let settings = load_settings(&settings_path);
        let persist_settings = !settings_path.exists();

        let mut effective = settings.clone();
        if let Some(fps) = args.fps {
            effective.fps_cap = fps;
        }
        if args.no_color {
            effective.enable_color = false;
        }

        let mut controller = FlowController::standard()?;
        if args.running || effective.start_running {
            controller.start_stop();
        }
        log::info!(
            "starting: {} tanks, fps cap {}, settings {}",
            controller.tanks().len(),
            effective.fps_cap,
            settings_path.display()
        );

        let term = Terminal::begin().context("entering terminal UI")?;

        Ok(Self {
            frame_dt: effective.frame_time(),
            session: Session::new(controller, &effective),
            settings,
            settings_path,
            persist_settings,
            term,
        })
    }

    fn run(&mut self) -> Result<()> {
        let mut last_frame = Instant::now();

        while !self.session.should_quit {
            self.term.resize_if_needed()?;

            // input
            for key in collect_input_nonblocking(self.frame_dt)? {
                if let Some(cmd) = map_key(self.session.show_help, key) {
                    self.session.apply(cmd);
                }
                if self.session.should_quit {
                    break;
                }
            }

            // sim + report timers
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            self.session.advance(real_dt);

            self.render_frame()?;

            spin_sleep(self.frame_dt, Instant::now());
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.term.end()?;
        if self.session.settings_dirty {
            self.settings.enable_color = self.session.enable_color;
            self.persist_settings = true;
        }
        if self.persist_settings {
            save_settings_atomic(&self.settings_path, &self.settings)?;
        }
        log::info!("exiting after {} ticks", self.session.controller.ticks());
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        let bg = Color::Black;
        let s = &self.session;
        let term = &mut self.term;
        term.cur.clear(bg);

        match s.view {
            View::Installation => {
                term.canvas.clear(Pixel::default());
                let cols = term.cols as i32;
                let rows = term.rows as i32;
                // top line and two bottom lines belong to the hud
                let vp = Viewport {
                    x: 0,
                    y: 4,
                    w: cols * 2,
                    h: (rows - 3).max(1) * 4,
                };
                let map = LayoutMap::fit(layout_bounds(&s.controller), vp);
                draw_installation(&mut term.canvas, &s.controller, &map);
                canvas_to_cells(&term.canvas, &mut term.cur, s.enable_color, bg);
                draw_tank_labels(&mut term.cur, &s.controller, &map, s.selected);
            }
            View::Report => draw_report(&mut term.cur, &s.report, 2, 2),
        }

        let selected = s
            .controller
            .tank(s.selected)
            .map(|t| t.label())
            .unwrap_or("-");
        draw_hud(
            &mut term.cur,
            &Hud {
                running: s.controller.is_running(),
                ticks: s.controller.ticks(),
                selected,
                view: s.view.name(),
                status: &s.status,
            },
        );

        if s.show_help {
            draw_center_box(&mut term.cur, "tankflow", HELP_TEXT);
        }

        term.present()?;
        Ok(())
    }
}

pub(crate) fn run(args: Args) -> Result<()> {
    let mut app = App::init(&args)?;
    let result = app.run();
    // restore the terminal even when the loop failed
    let closed = app.shutdown();
    result.and(closed)
}

/// Runs `ticks` steps without a terminal and prints the outcome.
pub(crate) fn run_headless(ticks: u64, json: bool) -> Result<()> {
    let mut controller = FlowController::standard()?;
    controller.start_stop();
    let mut moved = 0.0;
    for _ in 0..ticks {
        moved += controller.tick().moved();
    }
    log::info!(
        "headless run finished after {} ticks, {moved:.1} units moved",
        controller.ticks()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    } else {
        print!("{}", Report::capture(&controller));
    }
    Ok(())
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
