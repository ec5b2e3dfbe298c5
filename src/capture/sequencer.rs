//! Capture session state machine.
//!
//! A session runs NotStarted → Running → Done → NotStarted. `trigger` starts a
//! session, `step` advances it by one phase of one tile:
//!
//! 1. position: move the device to the next tile; the host waits the settle delay
//! 2. capture: render, read back and composite that tile
//!
//! Once every tile is in the canvas the canvas goes to the exporter. The
//! sequencer checks the abort flag before each step.

use std::path::PathBuf;
use std::time::Duration;

use crate::capture::compositor::Canvas;
use crate::capture::export::{Exporter, SessionSummary};
use crate::capture::renderer::TileRenderer;
use crate::capture::trigger::AbortHandle;
use crate::error::{BackendError, CaptureError};
use crate::grid::{self, GridPlan, GridPoint, Tile, TileSize, Tiles, WorldPoint};

/// Default pause between positioning the device and reading pixels back.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Session lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Done,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NotStarted => write!(f, "Not started"),
            SessionState::Running => write!(f, "Running"),
            SessionState::Done => write!(f, "Done"),
        }
    }
}

/// Per-session inputs, fixed while a session runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSettings {
    pub tile: TileSize,
    /// Scan origin; the device position is used when absent
    pub start_marker: Option<WorldPoint>,
    /// Far corner of the scan; a single tile when absent
    pub end_marker: Option<WorldPoint>,
    pub settle_delay: Duration,
}

impl CaptureSettings {
    pub fn new(tile: TileSize) -> Self {
        Self {
            tile,
            start_marker: None,
            end_marker: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Result of one `step` call.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// No session is running
    Idle,
    /// The device moved to `tile`; wait `settle` before the next step
    Positioned { tile: Tile, settle: Duration },
    /// `tile` is in the canvas
    Captured { tile: Tile },
    /// All tiles captured and exported
    Completed(CaptureReport),
    /// The abort flag was raised; the canvas was discarded
    Aborted,
}

/// Summary of a finished, exported session.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureReport {
    pub path: PathBuf,
    pub plan: GridPlan,
    pub origin: GridPoint,
}

struct Session {
    plan: GridPlan,
    origin: GridPoint,
    tiles: Tiles,
    pending: Option<Tile>,
    canvas: Canvas,
    captured: u64,
}

enum Advance {
    Step(StepOutcome),
    Exhausted,
}

/// Drives tile capture for one renderer and one exporter.
pub struct CaptureSequencer<R, E> {
    renderer: R,
    exporter: E,
    settings: CaptureSettings,
    state: SessionState,
    session: Option<Session>,
    abort: AbortHandle,
}

impl<R: TileRenderer, E: Exporter> CaptureSequencer<R, E> {
    pub fn new(renderer: R, exporter: E, settings: CaptureSettings) -> Self {
        Self {
            renderer,
            exporter,
            settings,
            state: SessionState::NotStarted,
            session: None,
            abort: AbortHandle::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    #[cfg(test)]
    pub fn exporter_mut(&mut self) -> &mut E {
        &mut self.exporter
    }

    /// Returns a handle that aborts the running session when raised.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Plan of the running session.
    #[cfg(test)]
    pub fn plan(&self) -> Option<&GridPlan> {
        self.session.as_ref().map(|s| &s.plan)
    }

    /// `(tiles captured, total tiles)` of the running session.
    pub fn progress(&self) -> Option<(u64, u64)> {
        self.session
            .as_ref()
            .map(|s| (s.captured, s.plan.tile_count()))
    }

    /// Starts a session from the configured markers.
    ///
    /// The start point is resolved and the plan computed here, once; device
    /// movement during the session cannot change them. Returns `Ok(false)`
    /// and changes nothing if a session is already running.
    pub fn trigger(&mut self) -> Result<bool, CaptureError> {
        if self.state == SessionState::Running {
            crate::log("Capture already running, trigger ignored");
            return Ok(false);
        }

        let (plan, origin) = self.resolve_plan()?;
        self.begin(plan, origin)
    }

    fn resolve_plan(&self) -> Result<(GridPlan, GridPoint), CaptureError> {
        let start = self
            .settings
            .start_marker
            .unwrap_or_else(|| self.renderer.position());
        let plan = grid::plan(self.settings.tile, start, self.settings.end_marker)?;
        Ok((plan, start.round()))
    }

    /// Starts a session over an already computed plan.
    pub fn begin(&mut self, plan: GridPlan, origin: GridPoint) -> Result<bool, CaptureError> {
        if self.state == SessionState::Running {
            crate::log("Capture already running, trigger ignored");
            return Ok(false);
        }
        plan.validate()?;
        WorldPoint::from(origin).validate("origin")?;

        self.abort.reset();
        crate::log(&format!(
            "Starting capture: {}x{} tiles of {} from ({}, {}), canvas {}x{}",
            plan.steps_x,
            plan.steps_y,
            plan.tile,
            origin.x,
            origin.y,
            plan.canvas_width,
            plan.canvas_height
        ));

        self.session = Some(Session {
            plan,
            origin,
            tiles: plan.tiles(),
            pending: None,
            canvas: Canvas::new(&plan),
            captured: 0,
        });
        self.state = SessionState::Running;
        Ok(true)
    }

    /// Advances the running session by one phase.
    ///
    /// Any error aborts the session: the partial canvas is dropped and the
    /// state returns to NotStarted.
    pub fn step(&mut self) -> Result<StepOutcome, CaptureError> {
        if self.state != SessionState::Running {
            return Ok(StepOutcome::Idle);
        }

        if self.abort.is_requested() {
            if let Some((captured, total)) = self.progress() {
                crate::log(&format!(
                    "Abort requested, capture stopped after {}/{} tiles",
                    captured, total
                ));
            }
            self.discard();
            return Ok(StepOutcome::Aborted);
        }

        match self.advance() {
            Ok(Advance::Step(outcome)) => Ok(outcome),
            Ok(Advance::Exhausted) => self.finish().map(StepOutcome::Completed),
            Err(e) => {
                crate::log(&format!("Capture aborted: {}", e));
                self.discard();
                Err(e)
            }
        }
    }

    /// Runs a full session over `plan`, sleeping the settle delay between
    /// positioning and capture. Returns `Ok(None)` if a session was already
    /// running or the session was aborted.
    pub fn run(
        &mut self,
        plan: GridPlan,
        origin: GridPoint,
    ) -> Result<Option<CaptureReport>, CaptureError> {
        if !self.begin(plan, origin)? {
            return Ok(None);
        }
        self.drive()
    }

    /// Triggers a session and runs it to completion.
    pub fn capture(&mut self) -> Result<Option<CaptureReport>, CaptureError> {
        if self.state == SessionState::Running {
            crate::log("Capture already running, trigger ignored");
            return Ok(None);
        }
        let (plan, origin) = self.resolve_plan()?;
        self.run(plan, origin)
    }

    fn drive(&mut self) -> Result<Option<CaptureReport>, CaptureError> {
        loop {
            match self.step()? {
                StepOutcome::Positioned { settle, .. } => {
                    if !settle.is_zero() {
                        std::thread::sleep(settle);
                    }
                }
                StepOutcome::Captured { .. } => {}
                StepOutcome::Completed(report) => return Ok(Some(report)),
                StepOutcome::Aborted | StepOutcome::Idle => return Ok(None),
            }
        }
    }

    fn advance(&mut self) -> Result<Advance, CaptureError> {
        let Self {
            renderer,
            session,
            settings,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            return Ok(Advance::Step(StepOutcome::Idle));
        };

        if let Some(tile) = session.pending.take() {
            let pixels = renderer
                .render_and_readback()
                .map_err(|e| tile_failed(tile, e.into()))?;

            let expected = (session.plan.tile.width, session.plan.tile.height);
            if pixels.dimensions() != expected {
                let (width, height) = pixels.dimensions();
                return Err(tile_failed(
                    tile,
                    format!(
                        "renderer returned {}x{}, expected {}",
                        width, height, session.plan.tile
                    )
                    .into(),
                ));
            }

            session
                .canvas
                .write(session.plan.canvas_offset(tile), &pixels, session.plan.tile)?;
            session.captured += 1;
            crate::log(&format!(
                "Tile {} captured ({}/{})",
                tile,
                session.captured,
                session.plan.tile_count()
            ));
            return Ok(Advance::Step(StepOutcome::Captured { tile }));
        }

        let Some(tile) = session.tiles.next() else {
            return Ok(Advance::Exhausted);
        };

        let world = session.plan.world_position(session.origin, tile);
        renderer
            .set_position(world.into())
            .map_err(|e| tile_failed(tile, e.into()))?;
        session.pending = Some(tile);

        Ok(Advance::Step(StepOutcome::Positioned {
            tile,
            settle: settings.settle_delay,
        }))
    }

    fn finish(&mut self) -> Result<CaptureReport, CaptureError> {
        let Some(session) = self.session.take() else {
            self.state = SessionState::NotStarted;
            return Err(CaptureError::InvalidConfiguration(
                "no capture session to finish".to_string(),
            ));
        };
        self.state = SessionState::Done;

        let summary = SessionSummary {
            plan: session.plan,
            origin: session.origin,
        };
        let image = session.canvas.finalize();
        let result = self.exporter.export(&image, &summary);
        self.state = SessionState::NotStarted;

        match result {
            Ok(path) => {
                crate::log(&format!(
                    "Capture complete: {} tiles -> {}",
                    summary.plan.tile_count(),
                    path.display()
                ));
                Ok(CaptureReport {
                    path,
                    plan: summary.plan,
                    origin: summary.origin,
                })
            }
            Err(e) => {
                crate::log(&format!("Export failed: {}", e));
                Err(e)
            }
        }
    }

    fn discard(&mut self) {
        self.session = None;
        self.state = SessionState::NotStarted;
    }
}

fn tile_failed(tile: Tile, source: BackendError) -> CaptureError {
    CaptureError::CaptureFailed {
        index_x: tile.index_x,
        index_y: tile.index_y,
        source,
    }
}
