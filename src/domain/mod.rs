pub mod config;
pub mod events;
pub mod loading;

pub use config::{
    AsyncTrigger, ButtonSettings, ButtonType, ElementValidator, FormButton, FormButtonCallback,
    FormConfig, FormElement, FormElementOption,
};
pub use events::FormEvent;
pub use loading::{LoadingError, LoadingState, LoadingStatus};
