use crate::config::DatabaseConfig;
use crate::error::ApiError;
use deadpool_postgres::{
    Manager, ManagerConfig, Metrics, Object, Pool, RecyclingMethod, Runtime, Status,
};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Shortest pause between two idle sweeps.
const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep period when only the idle cap applies.
const CAP_ONLY_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Handle on the PostgreSQL connection pool.
/// Cheap to clone; every clone shares the same underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    connect_timeout: Duration,
}

impl Database {
    /// Builds the pool, verifies it answers `SELECT 1` within the connect timeout,
    /// and starts the idle reaper.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ApiError> {
        info!("Creating PostgreSQL connection pool for {}", config.redacted_addr());

        let db = Self::build(config)?;

        match tokio::time::timeout(db.connect_timeout, db.ping()).await {
            Ok(result) => result?,
            Err(_) => {
                error!("Database did not answer within {:?}", db.connect_timeout);
                return Err(ApiError::Database("Connection timeout during startup ping".to_string()));
            }
        }

        let limits = IdleLimits::from_config(config);
        if limits.needs_reaper(config.max_open_conns) {
            db.spawn_idle_reaper(limits);
        }

        Ok(db)
    }

    /// Builds the pool without opening any connection.
    pub fn build(config: &DatabaseConfig) -> Result<Self, ApiError> {
        let pg_config = config
            .addr
            .parse::<tokio_postgres::Config>()
            .map_err(|e| {
                error!("Invalid database address: {}", e);
                ApiError::Database(format!("Invalid database address: {}", e))
            })?;

        let tls_connector = TlsConnector::builder()
            .build()
            .map_err(|e| {
                error!("Failed to create TLS connector: {}", e);
                ApiError::Database(format!("TLS connector creation failed: {}", e))
            })?;
        let tls = MakeTlsConnector::new(tls_connector);

        let manager = Manager::from_config(
            pg_config,
            tls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(config.max_open_conns)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(config.connect_timeout))
            .create_timeout(Some(config.connect_timeout))
            .recycle_timeout(Some(config.connect_timeout))
            .build()
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                ApiError::Database(format!("Connection pool creation failed: {}", e))
            })?;

        Ok(Database {
            pool,
            connect_timeout: config.connect_timeout,
        })
    }

    async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Round-trips `SELECT 1` on a pooled connection.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await?;

        debug!("Database ping successful");
        Ok(())
    }

    pub fn status(&self) -> Status {
        self.pool.status()
    }

    /// Drops idle connections past `max_idle_time`, then keeps at most
    /// `max_idle_conns` of the remaining ones, preferring the most recently used.
    pub fn reap_idle(&self, limits: IdleLimits) {
        let now = Instant::now();

        // First pass only records when each idle connection was last used
        let seen = Mutex::new(Vec::new());
        self.pool.retain(|_, metrics| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(last_used_at(&metrics));
            }
            true
        });
        let seen = seen.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());

        let sweep = limits.sweep(&seen, now);
        self.pool.retain(|_, metrics| sweep.keep(last_used_at(&metrics)));
    }

    fn spawn_idle_reaper(&self, limits: IdleLimits) -> JoinHandle<()> {
        let db = self.clone();
        let period = reap_interval(limits.max_idle_time);
        info!(
            "Idle connection reaper started (max idle {}, max idle time {:?}, every {:?})",
            limits.max_idle_conns, limits.max_idle_time, period
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if db.pool.is_closed() {
                    debug!("Pool closed, stopping idle reaper");
                    break;
                }
                db.reap_idle(limits);
                debug!("Pool status after idle sweep: {:?}", db.status());
            }
        })
    }

    pub fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close();
    }
}

/// Bounds on the idle part of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleLimits {
    pub max_idle_conns: usize,
    /// Zero means idle connections never expire by age.
    pub max_idle_time: Duration,
}

impl IdleLimits {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        IdleLimits {
            max_idle_conns: config.max_idle_conns,
            max_idle_time: config.max_idle_time,
        }
    }

    /// The reaper has work to do if idle connections can expire or the idle cap
    /// is tighter than the pool itself.
    pub fn needs_reaper(&self, max_open_conns: usize) -> bool {
        !self.max_idle_time.is_zero() || self.max_idle_conns < max_open_conns
    }

    fn is_fresh(&self, last_used_at: Instant, now: Instant) -> bool {
        self.max_idle_time.is_zero() || now.saturating_duration_since(last_used_at) < self.max_idle_time
    }

    /// Plans one sweep over idle connections last used at the given instants.
    pub fn sweep(&self, last_used: &[Instant], now: Instant) -> IdleSweep {
        let mut fresh: Vec<Instant> = last_used
            .iter()
            .copied()
            .filter(|at| self.is_fresh(*at, now))
            .collect();
        // Newest first
        fresh.sort_unstable_by(|a, b| b.cmp(a));

        let cutoff = match self.max_idle_conns {
            0 => None,
            cap => fresh.get(cap - 1).or(fresh.last()).copied(),
        };
        let newer_than_cutoff = cutoff.map_or(0, |c| fresh.iter().filter(|at| **at > c).count());

        IdleSweep {
            limits: *self,
            now,
            cutoff,
            tie_slots: self.max_idle_conns.saturating_sub(newer_than_cutoff),
            ties_kept: AtomicUsize::new(0),
        }
    }
}

/// Keep/drop decisions for a single pass over the idle connections.
#[derive(Debug)]
pub struct IdleSweep {
    limits: IdleLimits,
    now: Instant,
    /// Oldest last-use instant that still fits under the idle cap.
    cutoff: Option<Instant>,
    /// Slots left for connections last used exactly at the cutoff.
    tie_slots: usize,
    ties_kept: AtomicUsize,
}

impl IdleSweep {
    /// Whether the idle connection last used at `last_used_at` survives.
    pub fn keep(&self, last_used_at: Instant) -> bool {
        let Some(cutoff) = self.cutoff else {
            return false;
        };
        if !self.limits.is_fresh(last_used_at, self.now) || last_used_at < cutoff {
            return false;
        }
        if last_used_at > cutoff {
            return true;
        }
        self.ties_kept
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |kept| {
                (kept < self.tie_slots).then_some(kept + 1)
            })
            .is_ok()
    }
}

fn last_used_at(metrics: &Metrics) -> Instant {
    metrics.recycled.unwrap_or(metrics.created)
}

fn reap_interval(max_idle_time: Duration) -> Duration {
    if max_idle_time.is_zero() {
        return CAP_ONLY_REAP_INTERVAL;
    }
    (max_idle_time / 2).max(MIN_REAP_INTERVAL)
}
