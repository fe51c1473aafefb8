use serde::{Deserialize, Deserializer, Serialize};

pub type MessageId = String;
pub type TopicId = String;

/// A single exported chat message.
///
/// Deserializes from both the streamlined shape (`author`) and the raw export
/// shape, where the sender sits under `creator.name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub author: String,
    pub created_date: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<TopicId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

#[derive(Deserialize)]
struct Creator {
    name: String,
}

#[derive(Deserialize)]
struct MessageRecord {
    author: Option<String>,
    creator: Option<Creator>,
    created_date: String,
    #[serde(default)]
    text: String,
    topic_id: Option<TopicId>,
    message_id: Option<MessageId>,
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = MessageRecord::deserialize(deserializer)?;
        let author = match (record.author, record.creator) {
            (Some(author), _) => author,
            (None, Some(creator)) => creator.name,
            (None, None) => return Err(serde::de::Error::missing_field("author")),
        };
        Ok(Self {
            author,
            created_date: record.created_date,
            text: record.text,
            topic_id: record.topic_id,
            message_id: record.message_id,
        })
    }
}

/// Sender of a streamed message, nested the way the raw export nests it.
#[derive(Clone, Debug, Serialize)]
pub struct StreamedCreator<'a> {
    pub name: &'a str,
}

/// Payload of one server-sent event on the message stream.
///
/// Keeps the raw export layout (`creator.name`) that stream consumers read.
#[derive(Clone, Debug, Serialize)]
pub struct StreamedMessage<'a> {
    pub text: &'a str,
    pub created_date: &'a str,
    pub creator: StreamedCreator<'a>,
}

impl<'a> From<&'a Message> for StreamedMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            text: &message.text,
            created_date: &message.created_date,
            creator: StreamedCreator {
                name: &message.author,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_streamlined_shape() {
        let message: Message = serde_json::from_str(
            r#"{"author":"A","created_date":"t1","text":"hello","message_id":"m1"}"#,
        )
        .unwrap();
        assert_eq!(message.author, "A");
        assert_eq!(message.message_id.as_deref(), Some("m1"));
        assert_eq!(message.topic_id, None);
    }

    #[test]
    fn deserializes_raw_export_shape() {
        let message: Message = serde_json::from_str(
            r#"{"creator":{"name":"B","email":"b@example.com","user_type":"Human"},
                "created_date":"t3","text":"hello world","topic_id":"x"}"#,
        )
        .unwrap();
        assert_eq!(message.author, "B");
        assert_eq!(message.text, "hello world");
        assert_eq!(message.topic_id.as_deref(), Some("x"));
    }

    #[test]
    fn rejects_record_without_sender() {
        let err = serde_json::from_str::<Message>(r#"{"created_date":"t1","text":"x"}"#)
            .expect_err("expected missing author");
        assert!(err.to_string().contains("author"));
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let message: Message =
            serde_json::from_str(r#"{"author":"A","created_date":"t1"}"#).unwrap();
        assert_eq!(message.text, "");
    }

    #[test]
    fn serialization_skips_absent_ids() {
        let message = Message {
            author: "A".to_string(),
            created_date: "t1".to_string(),
            text: "hi".to_string(),
            topic_id: None,
            message_id: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"author": "A", "created_date": "t1", "text": "hi"})
        );
    }

    #[test]
    fn streamed_payload_nests_sender_under_creator() {
        let message = Message {
            author: "B".to_string(),
            created_date: "t3".to_string(),
            text: "hello world".to_string(),
            topic_id: Some("x".to_string()),
            message_id: Some("m3".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&StreamedMessage::from(&message)).unwrap(),
            r#"{"text":"hello world","created_date":"t3","creator":{"name":"B"}}"#
        );
    }
}
