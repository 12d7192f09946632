//! Builder for [`SlotLoader`].

use super::context::EngineContext;
use super::delivery::DeliveryLoop;
use super::handler::UnitHandler;
use super::inflight::InFlight;
use super::loader::SlotLoader;
use super::state::StateGate;
use crate::cache::{
    DimensionKeyGenerator, FilenameGenerator, HashedFilenameGenerator, KeyGenerator,
    TieredCacheManager,
};
use crate::config::EngineConfig;
use crate::decode::{Decoder, DecoderRegistry, DecoderRegistryBuilder};
use crate::error::EngineError;
use crate::pool::ExecutorPools;
use crate::queue::{Dispatcher, IdleCallback, RequestQueue};
use crate::task::TaskManager;
use std::sync::Arc;
use tracing::info;

/// Prefix of worker pool thread names.
pub const POOL_NAME: &str = "slotload";

/// Name of the dispatcher thread.
pub const DISPATCHER_THREAD_NAME: &str = "slotload-dispatcher";

/// Assembles a [`SlotLoader`] from configuration and collaborators.
///
/// ```ignore
/// let loader = SlotLoader::builder()
///     .with_config(EngineConfig::load_from(&config_file_path())?)
///     .register_decoder("http://", Arc::new(HttpDecoder::new()))
///     .on_idle(|| tracing::debug!("loader idle"))
///     .build()?;
/// ```
pub struct SlotLoaderBuilder {
    config: EngineConfig,
    decoders: DecoderRegistryBuilder,
    keys: Arc<dyn KeyGenerator>,
    filenames: Arc<dyn FilenameGenerator>,
    idle: Option<IdleCallback>,
}

impl Default for SlotLoaderBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            decoders: DecoderRegistry::builder(),
            keys: Arc::new(DimensionKeyGenerator),
            filenames: Arc::new(HashedFilenameGenerator),
            idle: None,
        }
    }
}

impl SlotLoaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a decoder for locators starting with `prefix`.
    pub fn register_decoder(mut self, prefix: impl Into<String>, decoder: Arc<dyn Decoder>) -> Self {
        self.decoders = self.decoders.register(prefix, decoder);
        self
    }

    /// Leaves out the built-in `file://` blob decoder.
    ///
    /// Disk-tier hits are re-loaded through `file://`, so a replacement
    /// must then be registered for that prefix.
    pub fn without_default_decoders(mut self) -> Self {
        self.decoders = self.decoders.without_defaults();
        self
    }

    pub fn key_generator(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn filename_generator(mut self, filenames: Arc<dyn FilenameGenerator>) -> Self {
        self.filenames = filenames;
        self
    }

    /// Called on the dispatcher thread each time the request queue goes idle.
    pub fn on_idle(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.idle = Some(Arc::new(callback));
        self
    }

    /// Starts the cache, pools, delivery thread and dispatcher.
    pub fn build(self) -> Result<SlotLoader, EngineError> {
        let config = self.config;

        let cache = TieredCacheManager::new(&config.cache, self.keys, self.filenames)?;
        let pools = ExecutorPools::new(
            POOL_NAME,
            config.pool.primary_threads,
            config.pool.effective_fallback_threads(),
        )?;

        let task_manager = Arc::new(TaskManager::new());
        let delivery =
            DeliveryLoop::start(Arc::clone(&task_manager)).map_err(|source| EngineError::Spawn {
                name: super::delivery::DELIVERY_THREAD_NAME.to_string(),
                source,
            })?;

        let queue = Arc::new(RequestQueue::new(config.queue.policy, config.queue.timeouts));
        if let Some(idle) = self.idle {
            queue.set_idle_callback(idle);
        }

        let ctx = Arc::new(EngineContext {
            task_manager,
            cache,
            pools,
            registry: self.decoders.build(),
            in_flight: InFlight::new(),
            delivery: delivery.sender(),
            state: StateGate::new(),
        });

        let handler = Arc::new(UnitHandler::new(Arc::clone(&ctx)));
        let dispatcher = Dispatcher::start(DISPATCHER_THREAD_NAME, queue, handler).map_err(
            |source| EngineError::Spawn {
                name: DISPATCHER_THREAD_NAME.to_string(),
                source,
            },
        )?;

        info!(
            primary_threads = config.pool.primary_threads,
            fallback_threads = config.pool.effective_fallback_threads(),
            policy = ?config.queue.policy,
            decoders = ctx.registry.len(),
            "Slot loader started"
        );

        Ok(SlotLoader::from_parts(ctx, dispatcher, delivery, config))
    }
}
