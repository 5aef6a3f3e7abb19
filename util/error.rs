use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the evaluation engine can report. A missing input field is never an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
	/// The model description is malformed or incomplete. This is detected when the model is loaded.
	#[error("invalid model structure: {message}")]
	InvalidModelStructure { message: String },
	/// An input value could not be coerced to the optype declared by its field.
	#[error("mismatched input type in field \"{field}\" for value {value}: expected {optype}")]
	TypeMismatch {
		field: String,
		value: String,
		optype: String,
	},
	#[error("unsupported operator \"{operator}\"")]
	UnsupportedOperator { operator: String },
	/// An option was not recognized or its value is out of range.
	#[error("invalid option: {message}")]
	InvalidOption { message: String },
	/// An ensemble member was neither supplied nor resolvable by the fetch collaborator.
	#[error("unresolved ensemble member {member}: {reason}")]
	UnresolvedEnsembleMember { member: String, reason: String },
}

impl Error {
	pub fn invalid_model(message: impl Into<String>) -> Error {
		Error::InvalidModelStructure {
			message: message.into(),
		}
	}

	pub fn invalid_option(message: impl Into<String>) -> Error {
		Error::InvalidOption {
			message: message.into(),
		}
	}

	pub fn type_mismatch(
		field: impl Into<String>,
		value: impl std::fmt::Display,
		optype: impl std::fmt::Display,
	) -> Error {
		Error::TypeMismatch {
			field: field.into(),
			value: value.to_string(),
			optype: optype.to_string(),
		}
	}
}

#[test]
fn test_error_messages() {
	let error = Error::type_mismatch("000001", "\"abc\"", "numeric");
	assert_eq!(
		error.to_string(),
		"mismatched input type in field \"000001\" for value \"abc\": expected numeric"
	);
	let error = Error::UnsupportedOperator {
		operator: "~".to_owned(),
	};
	assert_eq!(error.to_string(), "unsupported operator \"~\"");
}
