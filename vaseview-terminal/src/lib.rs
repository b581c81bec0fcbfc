//! Terminal host for the vase viewer: drives one viewport from keyboard,
//! mouse and resize events and draws it with the ASCII rasterizer.

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal,
};
use std::cell::RefCell;
use std::io::{stdout, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use vaseview_core::viewport::DIMENSION_RANGE;
use vaseview_core::{
    FsMeshStore, LoadEvent, Rgb, ScaleOutcome, Stage, TickOutcome, ViewParameters, ViewerConfig,
    ViewportId,
};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Product colors, in catalog order
pub const PALETTE: [(Rgb, &str); 10] = [
    (Rgb::from_hex(0xe7d5d5), "white"),
    (Rgb::from_hex(0x000000), "black"),
    (Rgb::from_hex(0xf14a4a), "red"),
    (Rgb::from_hex(0x99db99), "green"),
    (Rgb::from_hex(0x7878f1), "blue"),
    (Rgb::from_hex(0xffeb94), "yellow"),
    (Rgb::from_hex(0xdd8add), "pink"),
    (Rgb::from_hex(0x99dada), "turquoise"),
    (Rgb::from_hex(0xaaaaaa), "grey"),
    (Rgb::from_hex(0xffa500), "orange"),
];

/// The catalog's vase models, relative to the store root
pub fn default_models() -> Vec<String> {
    (1..=8).map(|n| format!("models/vase{n}.stl")).collect()
}

/// Name of a palette color, or its hex form
pub fn color_name(color: Rgb) -> String {
    PALETTE
        .iter()
        .find(|(c, _)| *c == color)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| color.to_string())
}

/// What a key press asks the viewer to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Dimensions { height: f32, width: f32 },
    NextColor,
    NextModel,
    Quit,
}

/// Map a key to a command given the current parameters
pub fn command_for_key(code: KeyCode, params: &ViewParameters) -> Option<Command> {
    let clamp = |v: f32| v.clamp(*DIMENSION_RANGE.start(), *DIMENSION_RANGE.end());
    let (height, width) = (params.height, params.width);
    let resized = |height: f32, width: f32| Command::Dimensions {
        height: clamp(height),
        width: clamp(width),
    };
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Up => Some(resized(height + 1.0, width)),
        KeyCode::Down => Some(resized(height - 1.0, width)),
        KeyCode::Right => Some(resized(height, width + 1.0)),
        KeyCode::Left => Some(resized(height, width - 1.0)),
        KeyCode::Char('c') => Some(Command::NextColor),
        KeyCode::Char('m') => Some(Command::NextModel),
        _ => None,
    }
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    stage: Stage<FsMeshStore, AsciiRenderer>,
    viewport: ViewportId,
    models: Vec<String>,
    model_index: usize,
    running: bool,
    status: Rc<RefCell<String>>,
}

impl TerminalApp {
    /// Mount a viewport over the whole terminal showing `models[0]`
    pub fn new(
        store: FsMeshStore,
        config: ViewerConfig,
        models: Vec<String>,
        params: ViewParameters,
    ) -> Result<Self> {
        let models = if models.is_empty() { default_models() } else { models };
        let (columns, rows) = terminal::size().context("failed to query terminal size")?;

        let mut stage = Stage::new(store, config);
        let status = Rc::new(RefCell::new(format!("loading {}", models[0])));
        let sink = Rc::clone(&status);
        stage.on_load_event(move |_, event| {
            *sink.borrow_mut() = match event {
                LoadEvent::Attached { path } => format!("showing {path}"),
                LoadEvent::Failed { path, error } => format!("could not load {path}: {error}"),
                LoadEvent::Discarded { path } => format!("skipped {path}"),
            };
        });

        let viewport = stage.mount(
            AsciiRenderer::new(columns as usize, rows as usize),
            &models[0],
            params.height,
            params.width,
            params.color,
        )?;

        Ok(Self {
            stage,
            viewport,
            models,
            model_index: 0,
            running: true,
            status,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        if let Err(err) = self.stage.teardown(self.viewport) {
            warn!(error = %err, "viewport already torn down");
        }
        terminal::disable_raw_mode()?;
        execute!(stdout(), DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> Result<()> {
        while self.running {
            let timeout = self
                .stage
                .next_frame_due()
                .map(|due| due.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(50));

            // Handle input
            if event::poll(timeout)? {
                self.handle_event(event::read()?)?;
            }

            let now = Instant::now();
            if self.stage.is_frame_due(self.viewport, now) {
                match self.stage.tick(self.viewport, now) {
                    TickOutcome::Rendered => self.present()?,
                    // Already logged by the frame loop
                    TickOutcome::Failed => {}
                    TickOutcome::Cancelled => self.running = false,
                }
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => {
                let params = *self.stage.params(self.viewport)?;
                if let Some(command) = command_for_key(code, &params) {
                    self.apply(command)?;
                }
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse)?,
            Event::Resize(columns, rows) => {
                self.stage
                    .on_resize(self.viewport, u32::from(columns), u32::from(rows) * 2)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        // Cells to half-cell pixels
        let x = f32::from(mouse.column) + 0.5;
        let y = f32::from(mouse.row) * 2.0 + 1.0;
        let id = self.viewport;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.stage.pointer_down(id, x, y)?;
            }
            MouseEventKind::Drag(MouseButton::Left) => self.stage.pointer_move(id, x, y)?,
            MouseEventKind::Up(MouseButton::Left) => self.stage.pointer_up(id)?,
            MouseEventKind::ScrollUp => self.stage.scroll(id, 1.0)?,
            MouseEventKind::ScrollDown => self.stage.scroll(id, -1.0)?,
            _ => {}
        }
        Ok(())
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        let id = self.viewport;
        match command {
            Command::Quit => self.running = false,
            Command::Dimensions { height, width } => {
                if let ScaleOutcome::Degenerate(degenerate) =
                    self.stage.set_dimensions(id, height, width)?
                {
                    *self.status.borrow_mut() = degenerate.to_string();
                }
            }
            Command::NextColor => {
                let current = self.stage.params(id)?.color;
                let index = PALETTE
                    .iter()
                    .position(|(c, _)| *c == current)
                    .map_or(0, |i| (i + 1) % PALETTE.len());
                self.stage.set_color(id, PALETTE[index].0)?;
            }
            Command::NextModel => {
                self.model_index = (self.model_index + 1) % self.models.len();
                let path = &self.models[self.model_index];
                info!(%path, "switching model");
                *self.status.borrow_mut() = format!("loading {path}");
                self.stage.set_model(id, path)?;
            }
        }
        Ok(())
    }

    fn status_line(&self) -> Result<String> {
        let params = self.stage.params(self.viewport)?;
        let fps = self.stage.viewport(self.viewport)?.frames().fps();
        Ok(format!(
            "Vaseview | {} | h {:.0} w {:.0} | {} | FPS: {:.1} | arrows=size c=color m=model drag=orbit wheel=zoom q=quit",
            self.status.borrow(),
            params.height,
            params.width,
            color_name(params.color),
            fps
        ))
    }

    fn present(&mut self) -> Result<()> {
        let status = self.status_line()?;
        let renderer = self.stage.surface(self.viewport)?;

        let mut stdout = stdout();
        renderer.draw(&mut stdout)?;

        // Draw UI overlay
        let columns = renderer.columns();
        let line: String = status.chars().take(columns).collect();
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetBackgroundColor(Color::Black),
            SetForegroundColor(Color::Yellow),
            Print(line),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }

    pub fn stage(&self) -> &Stage<FsMeshStore, AsciiRenderer> {
        &self.stage
    }
}
