//! Per-operation value extraction shared by the WSDL-driven resolvers.

use switchyard_core::{Binding, BindingOperation, PublishedService, Wsdl};

use crate::error::ResolutionError;

/// Derives at most one resolution value from a single WSDL binding operation.
pub trait OperationValue {
    type Value;

    /// Returns `None` to skip the operation.
    fn operation_value(
        &self,
        wsdl: &Wsdl,
        binding: &Binding,
        operation: &BindingOperation,
    ) -> Option<Self::Value>;
}

/// Collects one value per binding operation of a SOAP service's WSDL.
///
/// Non-SOAP services contribute no values.
///
/// # Errors
///
/// Returns [`ResolutionError::Wsdl`] if the service's WSDL is missing or
/// could not be parsed.
pub fn operation_values<T>(
    extractor: &T,
    service: &PublishedService,
) -> Result<Vec<T::Value>, ResolutionError>
where
    T: OperationValue + ?Sized,
{
    if !service.is_soap() {
        return Ok(Vec::new());
    }
    let wsdl = service
        .parsed_wsdl()
        .map_err(|source| ResolutionError::Wsdl {
            service: service.id,
            source,
        })?;
    Ok(wsdl
        .binding_operations()
        .filter_map(|(binding, op)| extractor.operation_value(&wsdl, binding, op))
        .collect())
}


#[cfg(test)]
mod tests {
    use switchyard_core::{QName, ServiceId, WsdlSource};

    use super::fixtures::{document_op, soap_service, wsdl};
    use super::*;

    struct OperationNames;

    impl OperationValue for OperationNames {
        type Value = String;

        fn operation_value(&self, _: &Wsdl, _: &Binding, op: &BindingOperation) -> Option<String> {
            (op.name != "skip").then(|| op.name.clone())
        }
    }

    #[test]
    fn one_value_per_operation() {
        let el = QName::new("urn:a", "x");
        let svc = soap_service(
            "s",
            "",
            wsdl(
                "urn:t",
                vec![
                    document_op("a", None, &[el.clone()]),
                    document_op("skip", None, &[el.clone()]),
                    document_op("b", None, &[el]),
                ],
            ),
        );
        assert_eq!(operation_values(&OperationNames, &svc).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn non_soap_service_contributes_nothing() {
        let svc = PublishedService::new(ServiceId::generate(), "plain");
        assert!(operation_values(&OperationNames, &svc).unwrap().is_empty());
    }

    #[test]
    fn unparsable_wsdl_is_an_error() {
        let mut svc = (*soap_service("s", "", Wsdl::default())).clone();
        svc.wsdl = Some(WsdlSource::Unparsable {
            reason: "bad".to_string(),
        });
        let err = operation_values(&OperationNames, &svc).unwrap_err();
        assert!(matches!(err, ResolutionError::Wsdl { service, .. } if service == svc.id));
    }
}
