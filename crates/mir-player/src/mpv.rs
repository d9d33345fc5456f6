/// mpv as the audio transport for the live stream.
///
/// ```text
///   PlayerCore ──StreamRequest──▶ run_client task ──JSON IPC──▶ mpv
///        ▲                              │
///        └──────── StreamEvent ◀────────┘  (property changes, end-file)
/// ```
///
/// `run_client` owns the mpv process and the IPC connection exclusively.
/// Property changes and `end-file` events are boiled down to [`StreamEvent`]s
/// by [`EventTranslator`] before they reach the core.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use mir_proto::protocol::StreamFault;

use crate::core::PlayerEvent;
use crate::stream::{StreamEvent, StreamRequest};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;
pub const OBS_PAUSED_FOR_CACHE: u64 = 3;

type Reply = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

struct OutgoingCommand {
    req_id: u64,
    line: String,
    reply: Reply,
}

/// Unsolicited mpv message (no `request_id`).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<OutgoingCommand>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&json!({ "command": command, "request_id": req_id }))?;
        line.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(OutgoingCommand {
                req_id,
                line,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Load `url` without starting playback.
    pub async fn load_paused(&self, url: &str, volume: u8) -> anyhow::Result<()> {
        self.set_pause(true).await?;
        self.set_volume(volume).await?;
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn reload(&self, url: &str) -> anyhow::Result<()> {
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn reload_audio_output(&self) -> anyhow::Result<()> {
        self.send(json!(["ao-reload"])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, percent: u8) -> anyhow::Result<()> {
        self.send(json!(["set_property", "volume", percent.min(100)]))
            .await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    /// Must be re-sent on every fresh connection.
    pub async fn observe_properties(&self) {
        let props = [
            (OBS_CORE_IDLE, "core-idle"),
            (OBS_PAUSE, "pause"),
            (OBS_PAUSED_FOR_CACHE, "paused-for-cache"),
        ];
        for (id, name) in props {
            if let Err(e) = self.send(json!(["observe_property", id, name])).await {
                warn!("mpv: observe_property {} failed: {}", name, e);
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: mir_proto::platform::mpv_socket_name(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => child.try_wait().ok().flatten().is_none(),
            None => false,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        let mpv_binary = mir_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        info!("mpv: spawning {:?}", mpv_binary);

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(mir_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<OutgoingCommand>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, why: &str) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", why)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let val: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                continue;
            }
        };

        let Some(req_id) = val.get("request_id").and_then(Value::as_u64) else {
            let _ = event_tx.send(MpvEvent { raw: val }).await;
            continue;
        };
        let Some(tx) = pending.lock().await.remove(&req_id) else {
            debug!("mpv reader: response for unknown req={}", req_id);
            continue;
        };
        let result = match val["error"].as_str() {
            Some("success") => Ok(val),
            other => Err(anyhow::anyhow!("mpv error: {}", other.unwrap_or("unknown error"))),
        };
        let _ = tx.send(result);
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<OutgoingCommand>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(cmd) = rx.recv().await {
        // Register first so the reader can always match the reply.
        pending.lock().await.insert(cmd.req_id, cmd.reply);
        debug!("mpv writer: req={} {}", cmd.req_id, cmd.line.trim());
        if let Err(e) = writer.write_all(cmd.line.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&cmd.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── event translation ─────────────────────────────────────────────────────────

/// Map an `end-file` event to a fault.  `None` for ordinary stops.
pub fn classify_end_file(raw: &Value) -> Option<StreamFault> {
    let reason = raw.get("reason").and_then(Value::as_str).unwrap_or("");
    match reason {
        // A live stream never reaches a real end of file.
        "eof" => Some(StreamFault::Network),
        "error" => {
            let detail = raw
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_lowercase();
            let network = ["loading failed", "network", "timeout", "connection", "http"];
            let media = ["format", "audio output", "no audio", "demux", "codec", "decod"];
            if network.iter().any(|k| detail.contains(k)) {
                Some(StreamFault::Network)
            } else if media.iter().any(|k| detail.contains(k)) {
                Some(StreamFault::Media)
            } else {
                Some(StreamFault::Other)
            }
        }
        _ => None,
    }
}

/// Turns raw mpv events into stream events, suppressing repeats.
///
/// The first observation of each property only records its value: mpv pushes
/// the current value as soon as a property is observed, which is not a
/// transition.
#[derive(Debug, Default)]
pub struct EventTranslator {
    pause: Option<bool>,
    core_idle: Option<bool>,
    last: Option<StreamEvent>,
}

impl EventTranslator {
    pub fn translate(&mut self, evt: &MpvEvent) -> Option<StreamEvent> {
        let out = match evt.as_property_change() {
            Some((OBS_PAUSE, data)) => {
                let paused = data.as_bool()?;
                let prev = self.pause.replace(paused);
                match prev {
                    Some(p) if p != paused => Some(if paused {
                        StreamEvent::Paused
                    } else {
                        StreamEvent::Playing
                    }),
                    _ => None,
                }
            }
            Some((OBS_CORE_IDLE, data)) => {
                let idle = data.as_bool()?;
                let prev = self.core_idle.replace(idle);
                (prev == Some(true) && !idle && self.pause != Some(true))
                    .then_some(StreamEvent::Playing)
            }
            Some((OBS_PAUSED_FOR_CACHE, data)) => {
                data.as_bool()?.then_some(StreamEvent::Buffering)
            }
            Some(_) => None,
            None => match evt.event_name() {
                Some("file-loaded") => Some(StreamEvent::Ready),
                Some("end-file") => classify_end_file(&evt.raw).map(StreamEvent::Fatal),
                _ => None,
            },
        }?;

        // Only state-like events are deduplicated; faults always go through.
        let dedup = matches!(
            out,
            StreamEvent::Playing | StreamEvent::Paused | StreamEvent::Buffering
        );
        if dedup && self.last.as_ref() == Some(&out) {
            return None;
        }
        self.last = Some(out.clone());
        Some(out)
    }
}

// ── client task ───────────────────────────────────────────────────────────────

/// Serve `StreamRequest`s until `Shutdown` or until the core goes away.
pub async fn run_client(
    mut requests: mpsc::UnboundedReceiver<StreamRequest>,
    core_tx: mpsc::Sender<PlayerEvent>,
) {
    let mut driver = MpvDriver::new();
    let mut handle: Option<MpvHandle> = None;
    let mut url: Option<String> = None;

    while let Some(req) = requests.recv().await {
        debug!("mpv client: {:?}", req);
        match req {
            StreamRequest::Start { url: u, volume } => {
                url = Some(u.clone());
                match connect(&mut driver, core_tx.clone()).await {
                    Ok(h) => {
                        if let Err(e) = h.load_paused(&u, volume).await {
                            warn!("mpv client: load failed: {}", e);
                            emit(&core_tx, StreamEvent::Fatal(StreamFault::Other)).await;
                        }
                        handle = Some(h);
                    }
                    Err(e) => {
                        warn!("mpv client: failed to start mpv: {}", e);
                        emit(&core_tx, StreamEvent::Fatal(StreamFault::Other)).await;
                    }
                }
            }
            StreamRequest::Play => {
                let result = match handle.as_ref() {
                    Some(h) => h.set_pause(false).await,
                    None => Err(anyhow::anyhow!("stream not loaded")),
                };
                let evt = match result {
                    Ok(()) => StreamEvent::PlayStarted,
                    Err(e) => StreamEvent::PlayFailed(e.to_string()),
                };
                emit(&core_tx, evt).await;
            }
            StreamRequest::Pause => {
                if let Some(h) = handle.as_ref() {
                    if let Err(e) = h.set_pause(true).await {
                        warn!("mpv client: pause failed: {}", e);
                    }
                }
            }
            StreamRequest::Volume(percent) => {
                if let Some(h) = handle.as_ref() {
                    if let Err(e) = h.set_volume(percent).await {
                        warn!("mpv client: volume failed: {}", e);
                    }
                }
            }
            StreamRequest::ResumeLoading => {
                if let (Some(h), Some(u)) = (handle.as_ref(), url.as_deref()) {
                    info!("mpv client: reloading stream");
                    if let Err(e) = h.reload(u).await {
                        warn!("mpv client: reload failed: {}", e);
                    }
                }
            }
            StreamRequest::RecoverMedia => {
                if let Some(h) = handle.as_ref() {
                    info!("mpv client: reloading audio output");
                    if let Err(e) = h.reload_audio_output().await {
                        warn!("mpv client: ao-reload failed: {}", e);
                    }
                }
            }
            StreamRequest::Shutdown => break,
        }

        if handle.is_some() && !driver.process_alive() {
            warn!("mpv client: process died");
            handle = None;
            emit(&core_tx, StreamEvent::Fatal(StreamFault::Other)).await;
        }
    }

    if let Some(h) = handle.take() {
        let _ = h.stop().await;
    }
    driver.kill().await;
    info!("mpv client: stopped");
}

/// Spawn mpv and wire its events, through a translator, into the core.
async fn connect(
    driver: &mut MpvDriver,
    core_tx: mpsc::Sender<PlayerEvent>,
) -> anyhow::Result<MpvHandle> {
    let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
    let handle = driver.spawn_and_connect(event_tx).await?;

    tokio::spawn(async move {
        let mut translator = EventTranslator::default();
        while let Some(evt) = event_rx.recv().await {
            debug!("mpv event: {:?}", evt.raw);
            if let Some(out) = translator.translate(&evt) {
                if core_tx.send(PlayerEvent::Stream(out)).await.is_err() {
                    break;
                }
            }
        }
    });

    handle.observe_properties().await;
    Ok(handle)
}

async fn emit(core_tx: &mpsc::Sender<PlayerEvent>, evt: StreamEvent) {
    let _ = core_tx.send(PlayerEvent::Stream(evt)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(id: u64, data: Value) -> MpvEvent {
        MpvEvent {
            raw: json!({ "event": "property-change", "id": id, "data": data }),
        }
    }

    fn named(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_first_pause_observation_is_silent() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&prop(OBS_PAUSE, json!(true))), None);
        assert_eq!(
            t.translate(&prop(OBS_PAUSE, json!(false))),
            Some(StreamEvent::Playing)
        );
        assert_eq!(
            t.translate(&prop(OBS_PAUSE, json!(true))),
            Some(StreamEvent::Paused)
        );
    }

    #[test]
    fn test_core_idle_flip_means_playing_once() {
        let mut t = EventTranslator::default();
        t.translate(&prop(OBS_PAUSE, json!(false)));
        assert_eq!(t.translate(&prop(OBS_CORE_IDLE, json!(true))), None);
        assert_eq!(
            t.translate(&prop(OBS_CORE_IDLE, json!(false))),
            Some(StreamEvent::Playing)
        );
        // idle → busy again after a stall: already Playing, suppressed
        t.translate(&prop(OBS_CORE_IDLE, json!(true)));
        assert_eq!(t.translate(&prop(OBS_CORE_IDLE, json!(false))), None);
    }

    #[test]
    fn test_buffering_and_back() {
        let mut t = EventTranslator::default();
        t.translate(&prop(OBS_PAUSE, json!(false)));
        t.translate(&prop(OBS_CORE_IDLE, json!(true)));
        assert_eq!(
            t.translate(&prop(OBS_PAUSED_FOR_CACHE, json!(true))),
            Some(StreamEvent::Buffering)
        );
        assert_eq!(t.translate(&prop(OBS_PAUSED_FOR_CACHE, json!(false))), None);
        assert_eq!(
            t.translate(&prop(OBS_CORE_IDLE, json!(false))),
            Some(StreamEvent::Playing)
        );
    }

    #[test]
    fn test_file_loaded_is_ready() {
        let mut t = EventTranslator::default();
        assert_eq!(
            t.translate(&named(json!({ "event": "file-loaded" }))),
            Some(StreamEvent::Ready)
        );
    }

    #[test]
    fn test_end_file_classification() {
        let net = json!({ "event": "end-file", "reason": "error", "file_error": "loading failed" });
        let media = json!({ "event": "end-file", "reason": "error", "file_error": "unrecognized file format" });
        let other = json!({ "event": "end-file", "reason": "error", "file_error": "something odd" });
        let eof = json!({ "event": "end-file", "reason": "eof" });
        let stop = json!({ "event": "end-file", "reason": "stop" });
        assert_eq!(classify_end_file(&net), Some(StreamFault::Network));
        assert_eq!(classify_end_file(&media), Some(StreamFault::Media));
        assert_eq!(classify_end_file(&other), Some(StreamFault::Other));
        assert_eq!(classify_end_file(&eof), Some(StreamFault::Network));
        assert_eq!(classify_end_file(&stop), None);
    }

    #[test]
    fn test_repeated_faults_are_not_suppressed() {
        let mut t = EventTranslator::default();
        let evt = named(json!({ "event": "end-file", "reason": "error", "file_error": "loading failed" }));
        assert!(t.translate(&evt).is_some());
        assert!(t.translate(&evt).is_some());
    }
}
