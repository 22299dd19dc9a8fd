//! Controller commands.
//!
//! A [`ControlRequest`] is parsed into a typed [`Command`] and executed
//! against the [`SessionManager`]. The same parser serves mutation messages
//! from rendering surfaces.

use luke_core::protocol::{
    CLEAR_CANVAS, DELETE_ELEMENT, DRAW_CIRCLE, DRAW_RECTANGLE, DRAW_TEXT, GET_ACTIVE_FILE,
    GET_ELEMENTS, GET_ELEMENT_BY_ID, SET_FILE,
};
use luke_core::{Circle, ControlRequest, Element, ElementId, Rectangle, Text};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::CommandError;
use crate::session::{Mutation, MutationOutcome, SessionManager};

/// A parsed controller command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Report the active document.
    GetActiveFile,
    /// Open and activate a document.
    SetFile {
        /// Document path as given.
        file_path: String,
    },
    /// Add or replace an element.
    Draw(Element),
    /// Remove an element.
    DeleteElement(ElementId),
    /// Remove every element.
    ClearCanvas,
    /// List all elements.
    GetElements,
    /// Look up one element.
    GetElementById(String),
}

impl Command {
    /// Interpret a request.
    ///
    /// Draw commands without an `id` get a generated one.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownCommand`] for an unrecognised `type`,
    /// [`CommandError::MissingField`] or [`CommandError::InvalidData`] when
    /// the arguments do not fit the command.
    pub fn parse(request: &ControlRequest) -> Result<Self, CommandError> {
        let command = match request.kind.as_str() {
            GET_ACTIVE_FILE => Self::GetActiveFile,
            SET_FILE => Self::SetFile {
                file_path: request
                    .target_path()
                    .ok_or(CommandError::MissingField("file_path"))?
                    .to_string(),
            },
            DRAW_CIRCLE => Self::Draw(Element::Circle(parse_data::<Circle>(&request.data)?)),
            DRAW_RECTANGLE => {
                Self::Draw(Element::Rectangle(parse_data::<Rectangle>(&request.data)?))
            }
            DRAW_TEXT => Self::Draw(Element::Text(parse_data::<Text>(&request.data)?)),
            DELETE_ELEMENT => Self::DeleteElement(required_id(&request.data)?.into()),
            CLEAR_CANVAS => Self::ClearCanvas,
            GET_ELEMENTS => Self::GetElements,
            GET_ELEMENT_BY_ID => Self::GetElementById(required_id(&request.data)?),
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(match command {
            Self::Draw(element) if element.id().is_empty() => {
                Self::Draw(element.with_generated_id())
            }
            command => command,
        })
    }

    /// The command name, for logs and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetActiveFile => GET_ACTIVE_FILE,
            Self::SetFile { .. } => SET_FILE,
            Self::Draw(Element::Circle(_)) => DRAW_CIRCLE,
            Self::Draw(Element::Rectangle(_)) => DRAW_RECTANGLE,
            Self::Draw(Element::Text(_)) => DRAW_TEXT,
            Self::DeleteElement(_) => DELETE_ELEMENT,
            Self::ClearCanvas => CLEAR_CANVAS,
            Self::GetElements => GET_ELEMENTS,
            Self::GetElementById(_) => GET_ELEMENT_BY_ID,
        }
    }

    /// The document mutation this command performs, if it is one.
    #[must_use]
    pub fn into_mutation(self) -> Option<Mutation> {
        match self {
            Self::Draw(element) => Some(Mutation::Add(element)),
            Self::DeleteElement(id) => Some(Mutation::Delete(id)),
            Self::ClearCanvas => Some(Mutation::Clear),
            _ => None,
        }
    }
}

fn parse_data<T: DeserializeOwned>(data: &Value) -> Result<T, CommandError> {
    if data.is_null() {
        return Err(CommandError::MissingField("data"));
    }
    serde_json::from_value(data.clone()).map_err(|e| CommandError::InvalidData(e.to_string()))
}

fn required_id(data: &Value) -> Result<String, CommandError> {
    match data.get("id") {
        None | Some(Value::Null) => Err(CommandError::MissingField("id")),
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(_) => Err(CommandError::InvalidData(
            "id must be a non-empty string".to_string(),
        )),
    }
}

fn mutation_result(outcome: MutationOutcome) -> Result<Value, CommandError> {
    Ok(match outcome {
        MutationOutcome::Added(element) => {
            serde_json::to_value(element).map_err(|e| CommandError::InvalidData(e.to_string()))?
        }
        MutationOutcome::Deleted { id, existed } => json!({ "id": id, "deleted": existed }),
        MutationOutcome::Cleared { removed } => json!({ "cleared": removed }),
    })
}

/// Run a command against the session manager and build its result payload.
///
/// `file_path` is the document the request named; `None` targets the active
/// document.
///
/// # Errors
///
/// Returns any [`CommandError`] raised while executing.
pub async fn execute(
    manager: &SessionManager,
    file_path: Option<&str>,
    command: Command,
) -> Result<Value, CommandError> {
    match command {
        Command::GetActiveFile => {
            let path = manager
                .active_path()
                .await
                .ok_or(crate::error::SessionError::NoActiveDocument)?;
            Ok(json!({ "file_path": path.to_string_lossy() }))
        }
        Command::SetFile { file_path } => {
            let path = manager.set_active_path(&file_path).await?;
            Ok(json!({ "status": "success", "file_path": path.to_string_lossy() }))
        }
        Command::GetElements => {
            let elements = manager.elements(file_path).await?;
            serde_json::to_value(elements).map_err(|e| CommandError::InvalidData(e.to_string()))
        }
        Command::GetElementById(id) => {
            let element = manager.element_by_id(file_path, &id).await?;
            serde_json::to_value(element).map_err(|e| CommandError::InvalidData(e.to_string()))
        }
        command @ (Command::Draw(_) | Command::DeleteElement(_) | Command::ClearCanvas) => {
            let Some(mutation) = command.into_mutation() else {
                return Err(CommandError::InvalidMessage("not a mutation".to_string()));
            };
            let outcome = manager.apply_mutation(file_path, mutation).await?;
            mutation_result(outcome)
        }
    }
}
