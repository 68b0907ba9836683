use crate::engine::Clock;
use crate::error::KernelError;
use crate::traits::Component;
use serde_json::Value;

pub mod generator;
pub mod multimeter;

macro_rules! register_components {
    ($($kind:expr => $type:ty),* $(,)?) => {
        /// Builds a model prototype of `kind`, configured by `data` unless it is null.
        pub fn create_component(
            kind: &str,
            data: &Value,
            clock: &Clock,
        ) -> Result<Box<dyn Component>, KernelError> {
            match kind {
                $(
                    $kind => {
                        let mut obj = <$type>::prototype(clock);
                        if !data.is_null() {
                            obj.set_status(data, clock)?;
                        }
                        Ok(Box::new(obj))
                    }
                )*
                _ => Err(KernelError::UnknownModel(kind.to_string())),
            }
        }

        pub fn available_models() -> Vec<&'static str> {
            vec![$($kind),*]
        }
    };
}

register_components!(
    "Multimeter" => multimeter::Multimeter,
    "Generator" => generator::Generator,
);
