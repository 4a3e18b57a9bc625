//! Application state: the sync context, one synchronized collection per
//! entity, live test-runner sessions, and the shared random source.
//!
//! Built once at startup (`AppState::new`) from env + TOML, or from explicit
//! parts (`AppState::from_parts`) so tests can inject an in-memory remote and
//! local store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::config::{load_config_from_env, AppConfig};
use crate::domain::*;
use crate::notify::Notifications;
use crate::remote::{MemoryRemote, RemoteStore};
use crate::runner::TestRunner;
use crate::settings::AccessCodeSettings;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::sync::{SyncContext, SyncedCollection};

pub struct AppState {
  pub config: AppConfig,
  pub sync: SyncContext,
  pub teachers: SyncedCollection<Teacher>,
  pub students: SyncedCollection<Student>,
  pub activities: SyncedCollection<StudentActivity>,
  pub classrooms: SyncedCollection<ClassRoom>,
  pub access_codes: SyncedCollection<AccessCode>,
  pub vocabulary: SyncedCollection<VocabularyWord>,
  pub grammar: SyncedCollection<GrammarRule>,
  pub math_problems: SyncedCollection<MathProblem>,
  pub quiz_questions: SyncedCollection<QuizQuestion>,
  pub runners: RwLock<HashMap<String, TestRunner>>,
  rng: Mutex<StdRng>,
}

impl AppState {
  /// Build state from env: load config, open local storage, connect the remote.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let config = load_config_from_env();

    let local: Arc<dyn KeyValueStore> = match &config.storage.data_dir {
      Some(dir) => match FileStore::open(dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
          error!(target: "classdesk", %dir, error = %e, "Cannot open local storage directory; using memory");
          Arc::new(MemoryStore::new())
        }
      },
      None => Arc::new(MemoryStore::new()),
    };

    let remote = match RemoteStore::from_config(&config.remote) {
      Some(r) => {
        if let RemoteStore::Rest(rest) = &r {
          info!(target: "classdesk", base_url = %rest.base_url, "Remote store enabled.");
        }
        r
      }
      None => {
        info!(target: "classdesk", "No REMOTE_URL/REMOTE_API_KEY. Using in-process remote tables.");
        RemoteStore::Memory(MemoryRemote::new())
      }
    };

    Self::from_parts(config, Some(remote), local)
  }

  pub fn from_parts(config: AppConfig, remote: Option<RemoteStore>, local: Arc<dyn KeyValueStore>) -> Self {
    let notices = Arc::new(Notifications::new(std::time::Duration::from_secs(config.notifications.ttl_secs)));
    let sync = SyncContext { remote: remote.map(Arc::new), local, notices };
    let rng = match config.sample.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Self {
      teachers: SyncedCollection::new(sync.clone()),
      students: SyncedCollection::new(sync.clone()),
      activities: SyncedCollection::new(sync.clone()),
      classrooms: SyncedCollection::new(sync.clone()),
      access_codes: SyncedCollection::new(sync.clone()),
      vocabulary: SyncedCollection::new(sync.clone()),
      grammar: SyncedCollection::new(sync.clone()),
      math_problems: SyncedCollection::new(sync.clone()),
      quiz_questions: SyncedCollection::new(sync.clone()),
      runners: RwLock::new(HashMap::new()),
      rng: Mutex::new(rng),
      sync,
      config,
    }
  }

  pub fn notices(&self) -> &Notifications {
    &self.sync.notices
  }

  /// Run `f` with the shared random source.
  pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut rng)
  }

  /// Installation defaults overlaid with the stored settings key.
  pub fn code_settings(&self) -> AccessCodeSettings {
    AccessCodeSettings::load(self.sync.local.as_ref(), &self.config.access_codes)
  }

  pub fn save_code_settings(&self, settings: &AccessCodeSettings) {
    settings.save(self.sync.local.as_ref());
  }

  /// Drop expired notifications, advance every runner session by `elapsed`,
  /// and drop the sessions that went stale.
  pub async fn tick(&self, elapsed: std::time::Duration) {
    self.notices().expire(Utc::now());
    let mut runners = self.runners.write().await;
    for runner in runners.values_mut() {
      runner.tick(elapsed);
    }
    let before = runners.len();
    runners.retain(|_, r| !r.is_stale(&self.config.runner));
    if runners.len() < before {
      debug!(target: "runner", dropped = before - runners.len(), live = runners.len(), "Stale runner sessions dropped");
    }
  }
}
