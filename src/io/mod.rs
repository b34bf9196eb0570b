pub mod exb;
pub mod output;
pub mod trs;

pub use exb::*;
pub use output::*;
pub use trs::*;

use std::str::FromStr;

use crate::error::DocumentError;
use crate::xml::XmlElement;

pub(crate) fn required_attr<'a>(
    element: &'a XmlElement,
    attribute: &'static str,
) -> Result<&'a str, DocumentError> {
    element
        .attr(attribute)
        .ok_or_else(|| DocumentError::MissingAttribute {
            element: element.name.clone(),
            attribute,
        })
}

pub(crate) fn parsed_attr<T: FromStr>(
    element: &XmlElement,
    attribute: &'static str,
) -> Result<T, DocumentError> {
    let value = required_attr(element, attribute)?;
    value
        .trim()
        .parse()
        .map_err(|_| DocumentError::InvalidNumber {
            element: element.name.clone(),
            attribute,
            value: value.to_string(),
        })
}
