//! Host-facing facade tying the session, tracker, gateway and photo pipeline
//! together for one device.

use std::sync::Arc;
use tracing::info;

use crate::commands::{Ack, CommandGateway, CommandKind, InterlockStatus};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::infra::HttpServer;
use crate::location::{LocationFilter, LocationRecord, LocationService, LocationSource};
use crate::photos::{PhotoBatch, PhotoPipeline};
use crate::server::FmdServer;
use crate::session::{AuthArtifacts, Credentials, Session, SessionAuthenticator};
use crate::tracking::{PollingMode, TrackingScheduler};

pub struct FmdClient {
    session: Arc<Session>,
    locations: LocationService,
    tracker: TrackingScheduler,
    gateway: CommandGateway,
    photos: PhotoPipeline,
}

impl FmdClient {
    /// Log in over HTTP and export artifacts for later password-free resumption.
    pub async fn authenticate(
        credentials: &Credentials,
        config: ClientConfig,
    ) -> Result<(Self, AuthArtifacts)> {
        let server = Arc::new(HttpServer::new(&credentials.base_url, &config)?);
        Self::authenticate_with(server, credentials, config).await
    }

    pub async fn authenticate_with(
        server: Arc<dyn FmdServer>,
        credentials: &Credentials,
        config: ClientConfig,
    ) -> Result<(Self, AuthArtifacts)> {
        config.validate()?;
        let session = SessionAuthenticator::new(server, config.clone())
            .authenticate(credentials)
            .await?;
        let artifacts = session.export_artifacts().await?;
        Ok((Self::from_session(Arc::new(session), config)?, artifacts))
    }

    /// Resume over HTTP from stored artifacts.
    pub async fn resume(artifacts: &AuthArtifacts, config: ClientConfig) -> Result<Self> {
        let server = Arc::new(HttpServer::new(&artifacts.base_url, &config)?);
        Self::resume_with(server, artifacts, config).await
    }

    pub async fn resume_with(
        server: Arc<dyn FmdServer>,
        artifacts: &AuthArtifacts,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let session = SessionAuthenticator::new(server, config.clone())
            .resume(artifacts)
            .await?;
        Self::from_session(Arc::new(session), config)
    }

    fn from_session(session: Arc<Session>, config: ClientConfig) -> Result<Self> {
        let locations = LocationService::new(Arc::clone(&session));
        let tracker = TrackingScheduler::new(locations.clone(), config.tracker.clone())?;
        let gateway = CommandGateway::new(Arc::clone(&session), &config.gateway);
        let photos = PhotoPipeline::new(Arc::clone(&session));
        info!(fmd_id = %session.fmd_id(), "Client ready");
        Ok(Self {
            session,
            locations,
            tracker,
            gateway,
            photos,
        })
    }

    /// Current artifacts, reflecting any token renewal since login.
    pub async fn export_artifacts(&self) -> Result<AuthArtifacts> {
        self.session.export_artifacts().await
    }

    /// Best current location under the tracker's accuracy settings.
    ///
    /// A forced refresh is an active poll and shares the tracker's overlap
    /// guard, so it never runs alongside a scheduled poll.
    pub async fn get_latest_location(
        &self,
        force_refresh: bool,
        source: LocationSource,
    ) -> Result<LocationRecord> {
        if force_refresh {
            return self.tracker.refresh(source).await;
        }
        let filter = LocationFilter::from(&self.tracker.config());
        self.locations.latest(&filter).await
    }

    pub fn set_polling_mode(&self, mode: PollingMode, interval_mins: Option<u32>) -> Result<()> {
        self.tracker.set_polling_mode(mode, interval_mins)
    }

    /// Send a non-destructive command. `Ack` means the server queued it.
    pub async fn send_command(&self, kind: CommandKind) -> Result<Ack> {
        self.gateway.send(kind).await
    }

    /// Arm the wipe interlock. Must be called from within a Tokio runtime.
    pub fn arm_wipe(&self) -> InterlockStatus {
        self.gateway.arm_wipe()
    }

    pub fn disarm_wipe(&self) -> bool {
        self.gateway.disarm_wipe()
    }

    pub async fn execute_wipe(&self, pin: &str) -> Result<Ack> {
        self.gateway.execute_wipe(pin).await
    }

    /// Newest `n` photos not seen before by this client.
    pub async fn list_photos(&self, n: usize) -> Result<PhotoBatch> {
        self.photos.fetch_new(n).await
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn locations(&self) -> &LocationService {
        &self.locations
    }

    pub fn tracker(&self) -> &TrackingScheduler {
        &self.tracker
    }

    pub fn gateway(&self) -> &CommandGateway {
        &self.gateway
    }

    pub fn photos(&self) -> &PhotoPipeline {
        &self.photos
    }
}
