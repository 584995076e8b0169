use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::ImageTensor;
use crate::config::{ServerConfig, TensorLayout};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("{0}")]
    Decode(String),
    #[error("Invalid input tensor: {0}")]
    Shape(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model returned {actual} scores, expected {expected}")]
    ScoreCount { expected: usize, actual: usize },
}

impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Model(err.to_string())
    }
}

/// A pretrained model mapping one preprocessed image to a score per class.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript classifier. `CModule` is not `Sync`, so calls are serialised.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    layout: TensorLayout,
}

impl TorchClassifier {
    pub fn load(path: &str, device: Device, layout: TensorLayout) -> Result<Self, InferenceError> {
        let mut module = CModule::load_on_device(path, device)?;
        module.set_eval();
        Ok(Self {
            module: Mutex::new(module),
            device,
            layout,
        })
    }

    fn to_tensor(&self, input: &ImageTensor) -> Result<Tensor, InferenceError> {
        let (n, h, w, c) = input.dims();
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Shape("pixel buffer is not contiguous".to_string()))?;
        let tensor = Tensor::from_slice(data).f_view([n as i64, h as i64, w as i64, c as i64])?;
        let tensor = match self.layout {
            TensorLayout::Nhwc => tensor,
            TensorLayout::Nchw => tensor.f_permute([0, 3, 1, 2])?.f_contiguous()?,
        };
        Ok(tensor.to_device(self.device))
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let tensor = self.to_tensor(input)?;
        let output = {
            let module = lock_ignoring_poison(&self.module);
            tch::no_grad(|| module.forward_ts(&[tensor]))?
        };
        let output_flat = output
            .to_device(Device::Cpu)
            .f_to_kind(Kind::Float)?
            .f_view([-1])?;
        let output_vec: Vec<f32> = output_flat.try_into()?;
        Ok(output_vec)
    }
}

/// A panicked forward pass leaves no partial state in the module, so a poisoned
/// lock is still usable.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn device_for(config: &ServerConfig) -> Device {
    if config.use_cuda {
        Device::cuda_if_available()
    } else {
        Device::Cpu
    }
}

/// Whether the classifier could be loaded at startup. Never changes afterwards.
#[derive(Clone)]
pub enum ModelState {
    Loaded(Arc<dyn Classifier>),
    Unavailable(String),
}

impl ModelState {
    pub fn load(config: &ServerConfig) -> Self {
        let device = device_for(config);
        match TorchClassifier::load(&config.model_path, device, config.tensor_layout) {
            Ok(classifier) => {
                log::info!("Loaded model {} on {:?}", config.model_path, device);
                ModelState::Loaded(Arc::new(classifier))
            }
            Err(e) => {
                log::error!("Error loading model {}: {}", config.model_path, e);
                ModelState::Unavailable(e.to_string())
            }
        }
    }

    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        match self {
            ModelState::Loaded(classifier) => Some(Arc::clone(classifier)),
            ModelState::Unavailable(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Loaded(_) => f.write_str("Loaded"),
            ModelState::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::test_support::FixedClassifier;

    #[test]
    fn missing_model_file_leaves_state_unavailable() {
        let config = ServerConfig {
            model_path: "does/not/exist.pt".to_string(),
            use_cuda: false,
            ..ServerConfig::default()
        };
        let state = ModelState::load(&config);
        assert!(!state.is_loaded());
        assert!(state.classifier().is_none());
        assert!(matches!(state, ModelState::Unavailable(ref reason) if !reason.is_empty()));
    }

    #[test]
    fn loaded_state_hands_out_shared_classifier() {
        let state = ModelState::Loaded(Arc::new(FixedClassifier::new(vec![0.1, 0.9, 0.0, 0.0])));
        assert!(state.is_loaded());
        assert!(state.classifier().is_some());
        assert_eq!(format!("{:?}", state), "Loaded");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let mutex = Arc::new(Mutex::new(7));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("forward pass panicked");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*lock_ignoring_poison(&mutex), 7);
    }

    #[test]
    fn tch_errors_become_model_errors() {
        let err = TorchClassifier::load("does/not/exist.pt", Device::Cpu, TensorLayout::Nhwc)
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::Model(_)));
    }
}
