//! Async owner of the viewer state.
//!
//! One cooperative task owns the mirror, overlays, viewport, and the
//! activity log, and drives them from the feed client's event stream.
//! The only suspension points are the snapshot fetch and the feed
//! channel; everything else is synchronous state mutation.
//!
//! Reconnect resync: every `Connected` event triggers a fresh snapshot
//! fetch, because mutations broadcast while disconnected are gone.

use std::collections::VecDeque;

use pixelfield_core::{AgentFingerprint, PixelEvent};
use pixelfield_sync::client::{ConnectionState, FeedClient, FeedEvent};

use crate::compose::compose_frame;
use crate::heatmap::ActivityHeatmap;
use crate::isolation::IsolationOverlay;
use crate::mirror::{CanvasMirror, CanvasSnapshot, HoverInfo, ViewError};
use crate::viewport::Viewport;

/// Most recent events kept for display
const ACTIVITY_CAPACITY: usize = 50;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No snapshot loaded yet (or the last load failed)
    Loading,
    /// Mirror current, feed attached
    Live,
    /// Feed dropped; rendering the last known state
    Reconnecting,
}

/// Bounded most-recent-first event log.
pub struct ActivityLog {
    entries: VecDeque<PixelEvent>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: PixelEvent) {
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &PixelEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(ACTIVITY_CAPACITY)
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HTTP base URL of the grid server
    pub server_url: String,
    /// Viewing rect used for the initial fit
    pub view_width: f32,
    pub view_height: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            view_width: 1024.0,
            view_height: 768.0,
        }
    }
}

/// The viewer session.
pub struct ViewerSession {
    config: SessionConfig,
    http: reqwest::Client,
    mirror: Option<CanvasMirror>,
    heatmap: Option<ActivityHeatmap>,
    heatmap_enabled: bool,
    isolation: Option<IsolationOverlay>,
    viewport: Viewport,
    activity: ActivityLog,
    status: SessionStatus,
    connection: ConnectionState,
}

impl ViewerSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            mirror: None,
            heatmap: None,
            heatmap_enabled: false,
            isolation: None,
            viewport: Viewport::new(),
            activity: ActivityLog::default(),
            status: SessionStatus::Loading,
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn mirror(&self) -> Option<&CanvasMirror> {
        self.mirror.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Fetch `/canvas` and rebuild the local state.
    pub async fn load_snapshot(&mut self) -> Result<(), ViewError> {
        let url = format!("{}/canvas", self.config.server_url);
        let snapshot: CanvasSnapshot = self.http.get(&url).send().await?.json().await?;
        self.install_snapshot(&snapshot)
    }

    /// Rebuild mirror and overlays from a snapshot payload.
    ///
    /// Keeps the viewport and an active isolation target across
    /// reloads; the heatmap window restarts (its events are stale).
    pub fn install_snapshot(&mut self, snapshot: &CanvasSnapshot) -> Result<(), ViewError> {
        let mirror = CanvasMirror::from_snapshot(snapshot)?;
        let first_load = self.mirror.is_none();
        let previous_target = self.isolation.as_ref().and_then(IsolationOverlay::target);

        let mut isolation = IsolationOverlay::new(mirror.width(), mirror.height());
        isolation.set_target(previous_target, &mirror);

        self.heatmap = Some(ActivityHeatmap::new(mirror.width(), mirror.height()));
        self.isolation = Some(isolation);
        if first_load {
            self.viewport = Viewport::fit(
                self.config.view_width,
                self.config.view_height,
                mirror.width() as f32,
                mirror.height() as f32,
            );
        }
        self.mirror = Some(mirror);
        self.status = SessionStatus::Live;
        Ok(())
    }

    /// Drive the session from the feed client. Runs until the event
    /// channel closes.
    pub async fn run(&mut self, mut client: FeedClient) -> Result<(), ViewError> {
        let mut events = client.take_event_rx().ok_or(ViewError::FeedUnavailable)?;
        tokio::spawn(async move {
            client.run().await;
        });

        while let Some(event) = events.recv().await {
            self.handle_feed_event(event).await;
        }
        Ok(())
    }

    /// Apply one feed event to the session state.
    pub async fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => {
                self.connection = ConnectionState::Connected;
                // Resync: anything broadcast while we were away is lost.
                if let Err(e) = self.load_snapshot().await {
                    log::warn!("Snapshot load failed: {e}");
                    self.status = SessionStatus::Loading;
                }
            }
            FeedEvent::Disconnected => {
                self.connection = ConnectionState::Disconnected;
                if self.status == SessionStatus::Live {
                    self.status = SessionStatus::Reconnecting;
                }
            }
            FeedEvent::Pixel(pixel) => self.apply_pixel(pixel),
        }
    }

    /// Apply one pixel mutation to every maintained structure.
    pub fn apply_pixel(&mut self, event: PixelEvent) {
        let Some(mirror) = self.mirror.as_mut() else {
            // No snapshot yet; the pending load will include this cell.
            return;
        };
        mirror.apply_event(&event);
        if let Some(hm) = self.heatmap.as_mut() {
            hm.record(event.x, event.y);
        }
        if let (Some(overlay), Some(hash)) = (self.isolation.as_mut(), &event.agent_hash) {
            if let Some(fp) = AgentFingerprint::from_hex(hash) {
                overlay.apply_event(event.x, event.y, fp, mirror);
            }
        }
        self.activity.push(event);
    }

    /// Set or clear the isolation target.
    pub fn set_isolation_target(&mut self, target: Option<AgentFingerprint>) {
        if let (Some(overlay), Some(mirror)) = (self.isolation.as_mut(), self.mirror.as_ref()) {
            overlay.set_target(target, mirror);
        }
    }

    pub fn toggle_heatmap(&mut self) {
        self.heatmap_enabled = !self.heatmap_enabled;
    }

    pub fn heatmap_enabled(&self) -> bool {
        self.heatmap_enabled
    }

    /// Compose the current frame, if a snapshot is loaded.
    pub fn frame(&self) -> Option<Vec<u8>> {
        let mirror = self.mirror.as_ref()?;
        let heatmap = self.heatmap_enabled.then_some(self.heatmap.as_ref()).flatten();
        Some(compose_frame(mirror, self.isolation.as_ref(), heatmap))
    }

    /// Inspect the cell under a device-space pointer.
    pub fn hover(&self, device_x: f32, device_y: f32) -> Option<HoverInfo> {
        let mirror = self.mirror.as_ref()?;
        let (x, y) = self.viewport.cell_at(device_x, device_y)?;
        mirror.hover(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::test_snapshot;
    use pixelfield_core::now_ms;

    fn pixel(x: u32, y: u32, agent: &str) -> PixelEvent {
        PixelEvent {
            x,
            y,
            color: "#22c55e".to_string(),
            agent_id: agent.to_string(),
            agent_hash: Some(AgentFingerprint::digest(agent).to_hex()),
            ts: now_ms(),
        }
    }

    fn live_session() -> ViewerSession {
        let mut session = ViewerSession::new(SessionConfig::default());
        session.install_snapshot(&test_snapshot(20, 20)).unwrap();
        session
    }

    #[test]
    fn test_activity_log_capacity() {
        let mut log = ActivityLog::new(50);
        for i in 0..60 {
            log.push(pixel(i, 0, "bot-a"));
        }
        assert_eq!(log.len(), 50);
        // Most recent first.
        assert_eq!(log.iter().next().unwrap().x, 59);
        assert_eq!(log.iter().last().unwrap().x, 10);
    }

    #[test]
    fn test_starts_loading() {
        let session = ViewerSession::new(SessionConfig::default());
        assert_eq!(session.status(), SessionStatus::Loading);
        assert!(session.frame().is_none());
    }

    #[test]
    fn test_install_snapshot_goes_live() {
        let session = live_session();
        assert_eq!(session.status(), SessionStatus::Live);
        assert_eq!(session.frame().unwrap().len(), 20 * 20 * 4);
    }

    #[test]
    fn test_apply_pixel_updates_everything() {
        let mut session = live_session();
        session.apply_pixel(pixel(5, 5, "bot-a"));

        assert_eq!(session.mirror().unwrap().color_at(5, 5), Some("#22c55e"));
        assert_eq!(session.activity().len(), 1);
        assert_eq!(session.heatmap.as_ref().unwrap().window_len(), 1);
    }

    #[test]
    fn test_pixel_before_snapshot_is_dropped() {
        let mut session = ViewerSession::new(SessionConfig::default());
        session.apply_pixel(pixel(5, 5, "bot-a"));
        assert!(session.activity().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_marks_reconnecting() {
        let mut session = live_session();
        session.handle_feed_event(FeedEvent::Disconnected).await;
        assert_eq!(session.status(), SessionStatus::Reconnecting);
        // Last known state still renders.
        assert!(session.frame().is_some());
    }

    #[test]
    fn test_isolation_target_survives_reload() {
        let mut session = live_session();
        session.apply_pixel(pixel(3, 3, "bot-a"));
        session.set_isolation_target(Some(AgentFingerprint::digest("bot-a")));
        assert!(session.isolation.as_ref().unwrap().is_active());

        session.install_snapshot(&test_snapshot(20, 20)).unwrap();
        assert_eq!(
            session.isolation.as_ref().unwrap().target(),
            Some(AgentFingerprint::digest("bot-a"))
        );
    }

    #[test]
    fn test_heatmap_toggle_changes_frame_path() {
        let mut session = live_session();
        assert!(!session.heatmap_enabled());
        session.toggle_heatmap();
        assert!(session.heatmap_enabled());
        assert!(session.frame().is_some());
    }

    #[test]
    fn test_hover_through_viewport() {
        let mut session = live_session();
        session.apply_pixel(pixel(2, 1, "bot-a"));
        // Identity viewport for a predictable transform.
        *session.viewport_mut() = Viewport::new();

        let info = session.hover(2.5, 1.5).unwrap();
        assert_eq!((info.x, info.y), (2, 1));
        assert_eq!(info.agent.as_deref(), Some("bot-a"));
    }
}
