// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine handle pool.
//
// Handles are acquired per invocation through a guard and returned when the
// guard drops. A handle that reports itself stale is discarded rather than
// returned, and the next acquire builds a fresh one. There is no shared
// engine state outside the pool.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use scanwerk_core::config::{EngineBackend, EngineConfig};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info};

use crate::engine::{InvocationRequest, OcrEngine, RawArtifact};
use crate::temp::TempScope;
use crate::tesseract::TesseractCli;

type EngineFactory = dyn Fn() -> Result<Box<dyn OcrEngine>> + Send + Sync;

/// Pool of independently owned engine handles.
#[derive(Clone)]
pub struct EnginePool {
    factory: Arc<EngineFactory>,
    idle: Arc<Mutex<Vec<Box<dyn OcrEngine>>>>,
    max_idle: usize,
}

impl EnginePool {
    /// Pool building handles with `factory`, keeping at most `max_idle` idle.
    pub fn new<F>(factory: F, max_idle: usize) -> Self
    where
        F: Fn() -> Result<Box<dyn OcrEngine>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            idle: Arc::new(Mutex::new(Vec::with_capacity(max_idle))),
            max_idle,
        }
    }

    /// Pool for the backend named in `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let max_idle = config.pool_size.max(1);
        match config.backend {
            EngineBackend::Tesseract => {
                let config = config.clone();
                Ok(Self::new(
                    move || Ok(Box::new(TesseractCli::new(config.clone())) as Box<dyn OcrEngine>),
                    max_idle,
                ))
            }
            #[cfg(feature = "ocr")]
            EngineBackend::Ocrs => {
                let model_config = crate::native::ModelConfig::from_engine_config(config);
                model_config.validate()?;
                Ok(Self::new(
                    move || {
                        let engine = crate::native::OcrsEngine::new(model_config.clone())?;
                        Ok(Box::new(engine) as Box<dyn OcrEngine>)
                    },
                    max_idle,
                ))
            }
            #[cfg(not(feature = "ocr"))]
            EngineBackend::Ocrs => Err(ScanwerkError::InvalidConfiguration(
                "the ocrs backend requires building with the `ocr` feature".into(),
            )),
        }
    }

    /// Take an idle handle, skipping stale ones, or build a new one.
    pub fn acquire(&self) -> Result<PooledEngine> {
        let reused = {
            let mut idle = self.idle.lock();
            let mut found = None;
            while let Some(engine) = idle.pop() {
                if engine.is_stale() {
                    debug!(engine = engine.name(), "discarding stale engine handle");
                    continue;
                }
                found = Some(engine);
                break;
            }
            found
        };

        let engine = match reused {
            Some(engine) => engine,
            None => {
                let engine = (self.factory)()?;
                info!(engine = engine.name(), "engine handle created");
                engine
            }
        };

        Ok(PooledEngine {
            engine,
            idle: Arc::clone(&self.idle),
            max_idle: self.max_idle,
        })
    }

    /// Number of idle handles currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Scoped engine handle; returned to the pool (or discarded) on drop.
pub struct PooledEngine {
    engine: Box<dyn OcrEngine>,
    idle: Arc<Mutex<Vec<Box<dyn OcrEngine>>>>,
    max_idle: usize,
}

impl Deref for PooledEngine {
    type Target = dyn OcrEngine;

    fn deref(&self) -> &Self::Target {
        &*self.engine
    }
}

impl DerefMut for PooledEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.engine
    }
}

impl Drop for PooledEngine {
    fn drop(&mut self) {
        let engine = std::mem::replace(&mut self.engine, Box::new(Released));
        if engine.is_stale() {
            debug!(engine = engine.name(), "stale engine handle released");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(engine);
        }
    }
}

/// Placeholder left in a guard while its handle goes back to the pool.
struct Released;

impl OcrEngine for Released {
    fn name(&self) -> &'static str {
        "released"
    }

    fn check_resources(&self) -> Result<()> {
        Ok(())
    }

    fn invoke(
        &mut self,
        _request: &InvocationRequest,
        _scope: &TempScope,
    ) -> Result<Vec<RawArtifact>> {
        Err(ScanwerkError::EngineInvocationFailed {
            engine: self.name().into(),
            diagnostic: "handle already returned to its pool".into(),
        })
    }

    fn is_stale(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Goes stale after its first invocation.
    struct OneShot {
        used: bool,
    }

    impl OcrEngine for OneShot {
        fn name(&self) -> &'static str {
            "one-shot"
        }

        fn check_resources(&self) -> Result<()> {
            Ok(())
        }

        fn invoke(
            &mut self,
            _request: &InvocationRequest,
            _scope: &TempScope,
        ) -> Result<Vec<RawArtifact>> {
            self.used = true;
            Ok(Vec::new())
        }

        fn is_stale(&self) -> bool {
            self.used
        }
    }

    fn counting_pool(max_idle: usize) -> (EnginePool, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = EnginePool::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(OneShot { used: false }) as Box<dyn OcrEngine>)
            },
            max_idle,
        );
        (pool, created)
    }

    #[test]
    fn idle_handle_is_reused() {
        let (pool, created) = counting_pool(2);
        drop(pool.acquire().expect("first"));
        assert_eq!(pool.idle_count(), 1);
        drop(pool.acquire().expect("second"));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn returned_handle_is_the_real_engine() {
        let (pool, _) = counting_pool(1);
        drop(pool.acquire().expect("first"));
        let again = pool.acquire().expect("second");
        assert_eq!(again.name(), "one-shot");
        assert!(!again.is_stale());
    }

    #[test]
    fn released_placeholder_refuses_work() {
        let scope = TempScope::new().expect("scope");
        let request = InvocationRequest::new(
            "/tmp/x.png",
            0,
            scanwerk_core::types::OutputMode::Structured,
        );
        let mut placeholder = Released;
        assert!(placeholder.is_stale());
        assert!(matches!(
            placeholder.invoke(&request, &scope),
            Err(ScanwerkError::EngineInvocationFailed { .. })
        ));
    }

    #[test]
    fn stale_handle_is_rebuilt() {
        let (pool, created) = counting_pool(2);
        let scope = TempScope::new().expect("scope");
        let request = InvocationRequest::new(
            "/tmp/x.png",
            0,
            scanwerk_core::types::OutputMode::Structured,
        );

        {
            let mut engine = pool.acquire().expect("acquire");
            engine.invoke(&request, &scope).expect("invoke");
        }
        assert_eq!(pool.idle_count(), 0);

        let engine = pool.acquire().expect("acquire again");
        assert!(!engine.is_stale());
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_guards_own_distinct_handles() {
        let (pool, created) = counting_pool(1);
        let a = pool.acquire().expect("a");
        let b = pool.acquire().expect("b");
        assert_eq!(created.load(Ordering::SeqCst), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn factory_errors_propagate() {
        let pool = EnginePool::new(
            || {
                Err(ScanwerkError::MissingEngineResource {
                    resource: "model".into(),
                    expected_path: "/models/x.rten".into(),
                })
            },
            1,
        );
        assert!(pool.acquire().is_err());
    }

    #[test]
    fn tesseract_pool_from_default_config() {
        let pool = EnginePool::from_config(&EngineConfig::default()).expect("pool");
        let engine = pool.acquire().expect("acquire");
        assert_eq!(engine.name(), "tesseract");
    }

    #[cfg(not(feature = "ocr"))]
    #[test]
    fn ocrs_backend_needs_feature() {
        let config = EngineConfig {
            backend: EngineBackend::Ocrs,
            ..EngineConfig::default()
        };
        assert!(matches!(
            EnginePool::from_config(&config),
            Err(ScanwerkError::InvalidConfiguration(_))
        ));
    }
}
