//! End-to-end generation for the signed-in user.
//!
//! `generate` resolves the session, prices the request, asks for
//! confirmation, submits, records a processing entry per task, polls
//! through the [`GenerationManager`] while applying its events to the
//! store, and finally refreshes the gem balance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nymia_backend::http::build_client;
use nymia_backend::{BackendConfig, BackendError, ConfigError, DataApi, PaymentApi, TaskApi};
use nymia_core::error::CoreError;
use nymia_core::events::GenerationEvent;
use nymia_core::generation::{GenerationTask, TaskRequest, TaskType};
use nymia_core::results::ClientResultEntry;
use nymia_core::store::{Action, Session, Store};
use nymia_core::types::TaskId;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::error::{GenerationError, PollError};
use crate::gate::{Confirmation, CreditGate};
use crate::library::AssetLibrary;
use crate::manager::GenerationManager;
use crate::poller::{outcome_event, PollConfig, PollResult};
use crate::submitter::TaskSubmitter;

pub struct GenerationFlow {
    submitter: TaskSubmitter,
    gate: CreditGate,
    data: DataApi,
    payments: Option<PaymentApi>,
    purchase_product: Option<String>,
    manager: Arc<GenerationManager>,
    store: Arc<Store>,
    max_poll_errors: u32,
    poll_interval: Option<Duration>,
}

impl GenerationFlow {
    /// Build every client from one shared HTTP connection pool.
    pub fn new(config: &BackendConfig, store: Arc<Store>) -> Result<Self, GenerationError> {
        let client = build_client(config)?;
        let tasks = TaskApi::with_client(client.clone(), config);
        let data = DataApi::with_client(client.clone(), config);
        let payments = match config.webhook_url {
            Some(_) => Some(PaymentApi::with_client(client, config)?),
            None => None,
        };
        let manager = GenerationManager::new(Arc::new(data.clone()), config.asset_base_url.clone());

        Ok(Self {
            submitter: TaskSubmitter::new(tasks.clone()),
            gate: CreditGate::new(tasks),
            data,
            payments,
            purchase_product: None,
            manager,
            store,
            max_poll_errors: config.max_poll_errors,
            poll_interval: None,
        })
    }

    /// Product offered when the balance is insufficient.
    pub fn with_purchase_product(mut self, prod_id: impl Into<String>) -> Self {
        self.purchase_product = Some(prod_id.into());
        self
    }

    /// Override the per-type poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn manager(&self) -> &Arc<GenerationManager> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn library(&self) -> AssetLibrary {
        AssetLibrary::new(self.data.clone(), Arc::clone(&self.store))
    }

    /// Resolve the account and load its balance into the store.
    pub async fn sign_in(&self, user_uuid: Uuid) -> Result<Session, GenerationError> {
        let user = self.data.fetch_user(user_uuid).await?;
        let session = Session {
            user_uuid: user.uuid,
            user_id: user.id,
        };

        self.store.dispatch(Action::SignedIn(session.clone())).await;
        self.store.dispatch(Action::CreditsLoaded(user.credits)).await;
        tracing::info!(user_uuid = %session.user_uuid, credits = user.credits, "Signed in");
        Ok(session)
    }

    pub async fn sign_out(&self) {
        self.store.dispatch(Action::SignedOut).await;
    }

    /// Re-fetch the user to pick up balance changes made server-side.
    pub async fn refresh_credits(&self) -> Result<f64, GenerationError> {
        let session = self.session().await?;
        let user = self.data.fetch_user(session.user_uuid).await?;
        self.store.dispatch(Action::CreditsLoaded(user.credits)).await;
        Ok(user.credits)
    }

    /// Checkout link for `prod_id`.
    pub async fn purchase_link(&self, prod_id: &str) -> Result<String, GenerationError> {
        let session = self.session().await?;
        let payments = self
            .payments
            .as_ref()
            .ok_or(BackendError::Config(ConfigError::Missing("NYMIA_WEBHOOK_URL")))?;
        Ok(payments.create_purchase_link(session.user_uuid, prod_id).await?)
    }

    /// Generate `count` results for `request` and wait for all of them.
    ///
    /// Returns the final result entries in submission order. Failed,
    /// timed-out and cancelled tasks are reported as failed entries,
    /// not as errors.
    pub async fn generate(
        &self,
        request: TaskRequest,
        count: u32,
        confirmation: &dyn Confirmation,
    ) -> Result<Vec<ClientResultEntry>, GenerationError> {
        let session = self.session().await?;
        request.validate()?;

        let quote = self
            .gate
            .quote(request.task_type, count, Some(&session.user_id))
            .await?;
        let balance = match self.store.read(|state| state.credits).await {
            Some(balance) => balance,
            None => self.refresh_credits().await?,
        };
        if let Err(e) = self.gate.check(&quote, balance, confirmation).await {
            return Err(self.attach_purchase_link(e, session.user_uuid).await);
        }

        let owner = session.storage_owner();
        let tasks = self
            .submitter
            .submit_many(&session.user_id, &owner, &request, count)
            .await?;

        let (source, target) = request.inputs();
        for task in &tasks {
            let entry = ClientResultEntry::processing(task.id.clone(), task.task_type)
                .with_inputs(source.clone(), target.clone());
            self.store.dispatch(Action::ResultSubmitted(entry)).await;
        }

        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        let results = self.poll(tasks, request.task_type, &ids).await?;

        for (task_id, result) in &results {
            self.store
                .dispatch(Action::Generation(outcome_event(task_id, result)))
                .await;
        }

        if let Err(e) = self.refresh_credits().await {
            tracing::warn!(error = %e, "Failed to refresh gem balance");
        }

        let entries: Vec<ClientResultEntry> = self
            .store
            .read(|state| {
                ids.iter()
                    .filter_map(|id| state.results.get(id).cloned())
                    .collect()
            })
            .await;
        Ok(entries)
    }

    /// Cancel every running poll loop.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    async fn poll(
        &self,
        tasks: Vec<GenerationTask>,
        task_type: TaskType,
        ids: &[TaskId],
    ) -> Result<Vec<(TaskId, PollResult)>, GenerationError> {
        let config = self.poll_config(task_type);
        let mut events = self.manager.subscribe();

        let results = match <[GenerationTask; 1]>::try_from(tasks) {
            Ok([task]) => {
                let task_id = task.id.clone();
                let tracked = self.manager.track(task, config).await?;
                let result = self.follow(&mut events, ids, tracked.wait()).await;
                vec![(task_id, result.unwrap_or(Err(PollError::Cancelled)))]
            }
            Err(tasks) => {
                let tracked = self.manager.track_batch(tasks, config).await?;
                match self.follow(&mut events, ids, tracked.wait()).await {
                    Some(outcome) => outcome.results,
                    None => ids
                        .iter()
                        .map(|id| (id.clone(), Err(PollError::Cancelled)))
                        .collect(),
                }
            }
        };
        Ok(results)
    }

    /// Apply events for `ids` to the store until `outcome` resolves.
    async fn follow<T>(
        &self,
        events: &mut broadcast::Receiver<GenerationEvent>,
        ids: &[TaskId],
        outcome: impl Future<Output = Option<T>>,
    ) -> Option<T> {
        tokio::pin!(outcome);

        let result = loop {
            tokio::select! {
                result = &mut outcome => break result,
                event = events.recv() => match event {
                    Ok(event) => self.apply(ids, event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Generation events lagged");
                    }
                    Err(RecvError::Closed) => break (&mut outcome).await,
                },
            }
        };

        while let Ok(event) = events.try_recv() {
            self.apply(ids, event).await;
        }
        result
    }

    async fn apply(&self, ids: &[TaskId], event: GenerationEvent) {
        if ids.contains(event.task_id()) {
            self.store.dispatch(Action::Generation(event)).await;
        }
    }

    async fn attach_purchase_link(&self, error: GenerationError, user_uuid: Uuid) -> GenerationError {
        let GenerationError::InsufficientCredits { required, balance, .. } = error else {
            return error;
        };

        let purchase_url = match (&self.payments, &self.purchase_product) {
            (Some(payments), Some(product)) => {
                match payments.create_purchase_link(user_uuid, product).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to create purchase link");
                        None
                    }
                }
            }
            _ => None,
        };

        GenerationError::InsufficientCredits {
            required,
            balance,
            purchase_url,
        }
    }

    fn poll_config(&self, task_type: TaskType) -> PollConfig {
        let config = PollConfig::for_task_type(task_type).with_max_poll_errors(self.max_poll_errors);
        match self.poll_interval {
            Some(interval) => config.with_interval(interval),
            None => config,
        }
    }

    async fn session(&self) -> Result<Session, GenerationError> {
        self.store
            .read(|state| state.session.clone())
            .await
            .ok_or_else(|| CoreError::InvalidState("no user is signed in".into()).into())
    }
}
