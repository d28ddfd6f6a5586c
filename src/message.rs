use std::collections::HashMap;

/// A message received from the queue.
///
/// The consumer never mutates a message; handlers receive their own copy.
/// The receipt handle is a one-time capability needed to delete the message
/// or change its visibility and is not a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_id: String,
    receipt_handle: String,
    body: Option<String>,
    md5_of_body: Option<String>,
    attributes: HashMap<String, String>,
    message_attributes: HashMap<String, MessageAttribute>,
}

/// A user-defined message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: Option<String>,
    pub binary_value: Option<Vec<u8>>,
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: Option<String>,
    ) -> Self {
        Message {
            message_id: message_id.into(),
            receipt_handle: receipt_handle.into(),
            body,
            md5_of_body: None,
            attributes: HashMap::new(),
            message_attributes: HashMap::new(),
        }
    }

    /// Adds a system attribute such as `ApproximateReceiveCount`.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_message_attribute(
        mut self,
        name: impl Into<String>,
        attribute: MessageAttribute,
    ) -> Self {
        self.message_attributes.insert(name.into(), attribute);
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn md5_of_body(&self) -> Option<&str> {
        self.md5_of_body.as_deref()
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn message_attributes(&self) -> &HashMap<String, MessageAttribute> {
        &self.message_attributes
    }
}

impl From<&aws_sdk_sqs::types::Message> for Message {
    fn from(message: &aws_sdk_sqs::types::Message) -> Self {
        let attributes = message
            .attributes()
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let message_attributes = message
            .message_attributes()
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(name, value)| {
                        let attribute = MessageAttribute {
                            data_type: value.data_type().to_string(),
                            string_value: value.string_value().map(str::to_string),
                            binary_value: value.binary_value().map(|blob| blob.as_ref().to_vec()),
                        };
                        (name.clone(), attribute)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Message {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            body: message.body().map(str::to_string),
            md5_of_body: message.md5_of_body().map(str::to_string),
            attributes,
            message_attributes,
        }
    }
}
