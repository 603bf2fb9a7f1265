//! Choosing where kernels run.

/// Which executor runs kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// On the calling thread, in host memory.
    Host,
    /// On a compute device through `wgpu`.
    Device,
}

/// The options of a [`Bridge`](crate::Bridge).
#[derive(Clone, Debug)]
pub struct Options {
    pub backend: BackendKind,
    /// The device APIs to consider for `BackendKind::Device`.
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Only consider software adapters.
    pub force_fallback_adapter: bool,
}

/// The variable selecting the backend, either `host` or `device`.
pub const BACKEND_VAR: &str = "PIXEL_BRIDGE_BACKEND";

impl Options {
    /// Options for running on the host only.
    pub fn host() -> Self {
        Options {
            backend: BackendKind::Host,
            ..Options::default()
        }
    }

    /// Start from the defaults and apply the environment.
    ///
    /// Reads `PIXEL_BRIDGE_BACKEND` as well as `WGPU_BACKEND` and `WGPU_POWER_PREF`, the
    /// variables that `wgpu` itself documents. Unknown values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut options = Options::default();

        if let Some(value) = std::env::var_os(BACKEND_VAR) {
            match value.to_str().map(str::to_ascii_lowercase).as_deref() {
                Some("host") | Some("cpu") => options.backend = BackendKind::Host,
                Some("device") | Some("gpu") => options.backend = BackendKind::Device,
                _ => log::warn!("Ignoring unknown {}={:?}", BACKEND_VAR, value),
            }
        }

        if let Some(backends) = wgpu::util::backend_bits_from_env() {
            options.backends = backends;
        }

        if let Some(preference) = wgpu::util::power_preference_from_env() {
            options.power_preference = preference;
        }

        options
    }

    pub(crate) fn instance_descriptor(&self) -> wgpu::InstanceDescriptor {
        wgpu::InstanceDescriptor {
            backends: self.backends,
            ..Default::default()
        }
    }

    pub(crate) fn adapter_options(&self) -> wgpu::RequestAdapterOptions<'static, 'static> {
        wgpu::RequestAdapterOptions {
            power_preference: self.power_preference,
            force_fallback_adapter: self.force_fallback_adapter,
            compatible_surface: None,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            backend: BackendKind::Device,
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}
