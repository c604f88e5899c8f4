//! Algorithm units, their descriptors, the registry and result routing

pub mod descriptor;
pub mod registry;
pub mod result;
pub mod unit;

pub use descriptor::AlgorithmDescriptor;
pub use registry::{AlgorithmRegistry, AlgorithmSummary};
pub use result::{AlgorithmResult, ResultDispatcher, ResultHandler, ResultKind, ResultPayload};
pub use unit::{Algorithm, InteractionKind, ParameterDefinition, ValueType};
