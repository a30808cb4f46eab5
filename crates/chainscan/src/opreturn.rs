//! The bundled decode hook: reports OP_RETURN payloads.

use bitcoin::hex::DisplayHex;
use bitcoin::script::Instruction;
use chainscan_core::{MessageDecoder, MessageFilter, Transaction};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpReturnMessage {
    pub output_index: u32,
    pub payload_hex: String,
    /// The payload as text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Decodes the first OP_RETURN output of a transaction. With a type in the
/// filter, only payloads that start with that tag are reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpReturnDecoder;

impl MessageDecoder for OpReturnDecoder {
    type Message = OpReturnMessage;
    type Error = bitcoin::script::Error;

    fn decode(
        &self,
        tx: &Transaction,
        filter: &MessageFilter,
    ) -> Result<Option<OpReturnMessage>, Self::Error> {
        let Some((index, output)) = tx
            .outputs
            .iter()
            .enumerate()
            .find(|(_, out)| out.script.is_op_return())
        else {
            return Ok(None);
        };

        let mut payload = Vec::new();
        for instruction in output.script.instructions().skip(1) {
            if let Instruction::PushBytes(bytes) = instruction? {
                payload.extend_from_slice(bytes.as_bytes());
            }
        }

        if let Some(tag) = &filter.message_type {
            if !payload.starts_with(tag.as_bytes()) {
                return Ok(None);
            }
        }

        Ok(Some(OpReturnMessage {
            output_index: index as u32,
            payload_hex: payload.to_lower_hex_string(),
            text: String::from_utf8(payload).ok(),
        }))
    }
}
