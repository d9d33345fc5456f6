/// PlayerCore — single-owner event loop for all player state.
///
/// The HTTP API, the stream client, the metadata tap and the timer tasks only
/// ever send `PlayerEvent`s into this loop.  PlayerCore owns the `Session`
/// (now-playing fields, fingerprint, history) and is the only writer of the
/// `ViewManager`, so every mutation is serialized here.
///
/// Timers are plain tasks that post ticks back into the loop.  Their abort
/// handles live on the core and are aborted on pause and on teardown.
/// Track changes are shown as a two-step transition (swap, then clear); each
/// step carries the generation it belongs to so a stale step from an
/// overtaken transition is ignored.
use std::sync::Arc;
use std::time::Duration;

use mir_proto::config::Config;
use mir_proto::fallback;
use mir_proto::id3;
use mir_proto::protocol::{status, Command, StreamFault};
use mir_proto::session::{DisplayUpdate, Session};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::host::HostPlatform;
use crate::stream::{MetadataSample, SampleKind, StreamEvent, StreamHandle, StreamRequest};
use crate::tap;
use crate::view::ViewManager;

const PROGRESS_PERIOD: Duration = Duration::from_millis(100);
const PROGRESS_STEP: f32 = 0.5;
const SWAP_DELAY: Duration = Duration::from_millis(100);
const CLEAR_DELAY: Duration = Duration::from_millis(500);

const SEEK_POPUP_TITLE: &str = "Seek";
const SEEK_POPUP_MESSAGE: &str = "Feature in development";

// ── PlayerEvent ───────────────────────────────────────────────────────────────

/// All inputs into the PlayerCore loop.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// A command from the HTTP API.
    Command(Command),
    /// Something the stream client or the metadata tap observed.
    Stream(StreamEvent),
    FallbackTick,
    ProgressTick,
    TransitionSwap { generation: u64 },
    TransitionClear { generation: u64 },
    /// Process is exiting (Ctrl-C).
    Shutdown,
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore {
    config: Config,
    session: Session,
    view: Arc<ViewManager>,
    host: Box<dyn HostPlatform>,
    stream: StreamHandle,
    /// Our own inbox, for the tasks we spawn.
    event_tx: mpsc::Sender<PlayerEvent>,
    rng: StdRng,
    /// True once the stream client has been asked to load the stream.
    initialized: bool,
    is_playing: bool,
    /// Progress bar position, 0..100.
    progress: f32,
    progress_timer: Option<AbortHandle>,
    fallback_timer: Option<AbortHandle>,
    transition: Option<AbortHandle>,
    tap: Option<AbortHandle>,
    transition_gen: u64,
    /// Title and artist waiting for the swap step.
    pending_track: Option<(String, String)>,
}

impl PlayerCore {
    pub fn new(
        config: Config,
        view: Arc<ViewManager>,
        host: Box<dyn HostPlatform>,
        stream: StreamHandle,
        event_tx: mpsc::Sender<PlayerEvent>,
    ) -> Self {
        Self::with_rng(config, view, host, stream, event_tx, StdRng::from_entropy())
    }

    pub fn with_rng(
        config: Config,
        view: Arc<ViewManager>,
        host: Box<dyn HostPlatform>,
        stream: StreamHandle,
        event_tx: mpsc::Sender<PlayerEvent>,
        rng: StdRng,
    ) -> Self {
        let session = Session::new(
            config.station.name.clone(),
            config.station.live_label.clone(),
            config.history.capacity,
        );
        Self {
            config,
            session,
            view,
            host,
            stream,
            event_tx,
            rng,
            initialized: false,
            is_playing: false,
            progress: 0.0,
            progress_timer: None,
            fallback_timer: None,
            transition: None,
            tap: None,
            transition_gen: 0,
            pending_track: None,
        }
    }

    /// Host setup, initial volume, then load the stream (paused).
    pub async fn startup(&mut self) {
        self.host.expand();
        self.host.enable_closing_confirmation();
        self.view.set_volume(self.config.player.default_volume).await;
        self.init_stream().await;
    }

    /// Run the core event loop.  Returns on `Close`, `Shutdown`, or when the
    /// event channel is closed.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PlayerEvent>) {
        info!("PlayerCore: starting event loop");
        self.startup().await;

        while let Some(evt) = event_rx.recv().await {
            if !self.handle_event(evt).await {
                break;
            }
        }
        info!("PlayerCore: event loop finished");
    }

    /// Handle one event.  Returns false once the loop should stop.
    pub async fn handle_event(&mut self, evt: PlayerEvent) -> bool {
        match evt {
            PlayerEvent::Command(cmd) => {
                debug!("PlayerCore: command {:?}", cmd);
                return self.handle_command(cmd).await;
            }
            PlayerEvent::Stream(evt) => self.handle_stream_event(evt).await,
            PlayerEvent::FallbackTick => self.fallback_tick().await,
            PlayerEvent::ProgressTick => {
                self.progress = (self.progress + PROGRESS_STEP) % 100.0;
                self.view.set_progress(self.progress / 100.0).await;
            }
            PlayerEvent::TransitionSwap { generation } => {
                if generation == self.transition_gen {
                    if let Some((title, artist)) = self.pending_track.take() {
                        self.view.set_track(&title, &artist).await;
                    }
                }
            }
            PlayerEvent::TransitionClear { generation } => {
                if generation == self.transition_gen {
                    self.view.end_track_change().await;
                }
            }
            PlayerEvent::Shutdown => {
                info!("PlayerCore: shutdown requested");
                self.teardown().await;
                return false;
            }
        }
        true
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::TogglePlay => self.toggle().await,
            Command::SetVolume { percent } => {
                let percent = percent.min(100);
                self.view.set_volume(percent).await;
                self.stream.send(StreamRequest::Volume(percent));
            }
            Command::SkipBack | Command::SkipForward => {
                self.host.show_popup(SEEK_POPUP_TITLE, SEEK_POPUP_MESSAGE);
                self.view.show_popup(SEEK_POPUP_TITLE, SEEK_POPUP_MESSAGE).await;
            }
            Command::ToggleHistory => {
                self.view.toggle_history().await;
            }
            Command::Close => {
                info!("PlayerCore: close requested");
                self.teardown().await;
                self.host.close();
                self.view.set_closed().await;
                return false;
            }
            Command::GetState => {
                // The view is read directly by the HTTP layer.
            }
        }
        true
    }

    // ── stream ────────────────────────────────────────────────────────────────

    async fn init_stream(&mut self) {
        info!("PlayerCore: loading {}", self.config.stream.url);
        self.stream.send(StreamRequest::Start {
            url: self.config.stream.url.clone(),
            volume: self.view.snapshot().await.volume_percent,
        });
        self.initialized = true;
        self.view.set_status(status::CONNECTING).await;

        if self.config.tap.enabled && self.tap.is_none() {
            let poll = Duration::from_secs(self.config.tap.poll_secs.max(1));
            match tap::spawn(&self.config.stream.url, poll, self.event_tx.clone()) {
                Ok(handle) => self.tap = Some(handle),
                Err(e) => warn!("PlayerCore: metadata tap not started: {}", e),
            }
        }
    }

    async fn toggle(&mut self) {
        if !self.initialized {
            self.init_stream().await;
            return;
        }

        if self.is_playing {
            self.stream.send(StreamRequest::Pause);
            self.set_playing(false).await;
            self.view.set_status(status::PAUSED).await;
            self.stop_timers().await;
        } else {
            // Optimistic; rolled back by PlayFailed.
            self.set_playing(true).await;
            self.stream.send(StreamRequest::Play);
        }
    }

    async fn handle_stream_event(&mut self, evt: StreamEvent) {
        match evt {
            StreamEvent::Ready => self.view.set_status(status::STREAM_CONNECTED).await,
            StreamEvent::PlayStarted => {
                if !self.is_playing {
                    debug!("PlayerCore: play confirmed after pause, ignored");
                    return;
                }
                self.view.set_status(status::LISTENING).await;
                self.start_timers();
            }
            StreamEvent::PlayFailed(reason) => {
                warn!("PlayerCore: play failed: {}", reason);
                self.view.set_status(status::PLAYBACK_ERROR).await;
                self.set_playing(false).await;
            }
            StreamEvent::Playing => {
                self.set_playing(true).await;
                self.view.set_status(status::STREAM_ONLINE).await;
            }
            StreamEvent::Paused => {
                self.set_playing(false).await;
                self.view.set_status(status::PAUSED).await;
                self.stop_timers().await;
            }
            StreamEvent::Buffering => self.view.set_status(status::BUFFERING).await,
            StreamEvent::Fatal(fault) => {
                warn!("PlayerCore: stream fault {:?}", fault);
                self.view.set_status(fault.status()).await;
                match fault {
                    StreamFault::Network => self.stream.send(StreamRequest::ResumeLoading),
                    StreamFault::Media => self.stream.send(StreamRequest::RecoverMedia),
                    StreamFault::Other => {}
                }
            }
            StreamEvent::Metadata(samples) => self.apply_samples(&samples).await,
        }
    }

    async fn apply_samples(&mut self, samples: &[MetadataSample]) {
        for sample in samples.iter().filter(|s| s.kind == SampleKind::Id3) {
            let frames = id3::decode(&sample.data);
            debug!("PlayerCore: {} frame(s) in metadata sample", frames.len());
            for update in self.session.apply_frames(&frames) {
                self.show(update).await;
            }
        }
    }

    async fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
        self.view.set_playing(playing).await;
    }

    // ── display ───────────────────────────────────────────────────────────────

    async fn fallback_tick(&mut self) {
        if !fallback::due(self.session.now_playing(), self.is_playing) {
            return;
        }
        let Some(track) = fallback::pick(&self.config.fallback.tracks, &mut self.rng).cloned() else {
            return;
        };
        if let Some(update) = self.session.fill_fallback(&track) {
            self.show(update).await;
        }
    }

    /// Status and history change now; the track fields swap after a short
    /// delay and the changing marker clears after another.
    async fn show(&mut self, update: DisplayUpdate) {
        let history = update
            .history_changed
            .then(|| self.session.history().to_vec());
        self.view.begin_track_change(&update.status, history).await;

        self.transition_gen += 1;
        let generation = self.transition_gen;
        self.pending_track = Some((update.title, update.artist));

        if let Some(prev) = self.transition.take() {
            prev.abort();
        }
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(SWAP_DELAY).await;
            if tx.send(PlayerEvent::TransitionSwap { generation }).await.is_err() {
                return;
            }
            tokio::time::sleep(CLEAR_DELAY).await;
            let _ = tx.send(PlayerEvent::TransitionClear { generation }).await;
        });
        self.transition = Some(task.abort_handle());
    }

    // ── timers ────────────────────────────────────────────────────────────────

    fn start_timers(&mut self) {
        if self.progress_timer.is_none() {
            self.progress_timer = Some(self.spawn_ticker(PROGRESS_PERIOD, || PlayerEvent::ProgressTick));
        }
        if self.fallback_timer.is_none() {
            let period = Duration::from_secs(self.config.fallback.interval_secs.max(1));
            self.fallback_timer = Some(self.spawn_ticker(period, || PlayerEvent::FallbackTick));
        }
    }

    fn spawn_ticker(&self, period: Duration, make: fn() -> PlayerEvent) -> AbortHandle {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(make()).await.is_err() {
                    break;
                }
            }
        })
        .abort_handle()
    }

    async fn stop_timers(&mut self) {
        if let Some(h) = self.progress_timer.take() {
            h.abort();
            self.progress = 0.0;
            self.view.set_progress(0.0).await;
        }
        if let Some(h) = self.fallback_timer.take() {
            h.abort();
        }
    }

    async fn teardown(&mut self) {
        if let Some(h) = self.tap.take() {
            h.abort();
        }
        if let Some(h) = self.transition.take() {
            h.abort();
        }
        self.stop_timers().await;
        self.stream.send(StreamRequest::Shutdown);
        self.set_playing(false).await;
    }
}
