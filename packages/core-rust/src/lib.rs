//! `Switchyard` Core: published services, WSDL model, request facets, and
//! resolution parameters shared by the resolution engine.

pub mod message;
pub mod params;
pub mod qname;
pub mod service;
pub mod wsdl;

pub use message::{FacetError, HttpFacet, Message, SoapFacet};
pub use params::{ResolutionAddress, ResolutionParameters};
pub use qname::{ParseQNameError, QName};
pub use service::{PublishedService, ServiceId, WsdlSource};
pub use wsdl::{
    Binding, BindingOperation, BindingStyle, BodyUse, MessagePart, OperationInput,
    OperationKind, SoapBody, Wsdl,
};
