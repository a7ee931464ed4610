//! Wire payload construction, one builder per operation kind.

use super::types::{
    ChatCompletionRequest, ChatMessage, ChatMessageContent, Content, GenerateContentRequest,
    GenerationConfig, ImageConfig, InlineData, MessagePart, Part,
};
use super::Endpoint;
use crate::models::{FieldNaming, GenerateRequest, ModelSettings, OperationRequest};
use crate::validation::compact_base64;
use crate::{prompts, Result};
use serde_json::{Map, Value};

pub const ANALYZE_TEMPERATURE: f64 = 0.7;
pub const FUSE_TEMPERATURE: f64 = 0.7;
pub const RECOGNIZE_TEMPERATURE: f64 = 0.3;

/// Mime type declared for every forwarded image; the proxy does not sniff it.
pub const FORWARDED_IMAGE_MIME: &str = "image/jpeg";

/// A serialized request body and the remote operation it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPayload {
    pub endpoint: Endpoint,
    pub body: Value,
}

/// Dispatch to the builder for the request's operation kind.
pub fn build(request: &OperationRequest, settings: &ModelSettings) -> Result<BuiltPayload> {
    match request {
        OperationRequest::Analyze {
            image,
            system_instruction,
        } => build_analyze(image, system_instruction, settings),
        OperationRequest::Recognize {
            image,
            system_instruction,
        } => build_recognize(image, system_instruction, settings),
        OperationRequest::Fuse {
            analysis,
            product_info,
            system_instruction,
        } => build_fuse(analysis, product_info, system_instruction, settings),
        OperationRequest::Generate(request) => build_generate(request, settings),
    }
}

pub fn build_analyze(
    image: &str,
    system_instruction: &str,
    settings: &ModelSettings,
) -> Result<BuiltPayload> {
    vision_chat(
        image,
        system_instruction,
        prompts::ANALYZE_USER,
        ANALYZE_TEMPERATURE,
        settings,
    )
}

pub fn build_recognize(
    image: &str,
    system_instruction: &str,
    settings: &ModelSettings,
) -> Result<BuiltPayload> {
    vision_chat(
        image,
        system_instruction,
        prompts::RECOGNIZE_USER,
        RECOGNIZE_TEMPERATURE,
        settings,
    )
}

pub fn build_fuse(
    analysis: &str,
    product_info: &str,
    system_instruction: &str,
    settings: &ModelSettings,
) -> Result<BuiltPayload> {
    // Both texts are embedded as written, placeholders included.
    let user_text = prompts::render(
        prompts::FUSE_USER,
        &[("analysis", analysis), ("product", product_info)],
    );

    let request = ChatCompletionRequest {
        model: settings.analyze_model.clone(),
        messages: vec![
            ChatMessage::system(system_instruction),
            ChatMessage::user(ChatMessageContent::Text(user_text)),
        ],
        temperature: FUSE_TEMPERATURE,
    };

    Ok(BuiltPayload {
        endpoint: Endpoint::ChatCompletions,
        body: serde_json::to_value(&request)?,
    })
}

/// Text-to-image when the reference is absent or blank, image-to-image otherwise.
pub fn build_generate(request: &GenerateRequest, settings: &ModelSettings) -> Result<BuiltPayload> {
    let mut parts = Vec::with_capacity(2);

    // Image before text; some proxy variants depend on this order.
    if let Some(reference) = request.reference() {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: FORWARDED_IMAGE_MIME.to_string(),
                data: compact_base64(reference),
            },
        });
    }
    parts.push(Part::Text {
        text: request.prompt.clone(),
    });

    let aspect_ratio = request
        .aspect_ratio
        .as_deref()
        .map(str::trim)
        .filter(|ratio| !ratio.is_empty())
        .map(str::to_string);
    let image_config = if aspect_ratio.is_some() || request.resolution.is_some() {
        Some(ImageConfig {
            aspect_ratio,
            image_size: request.resolution,
        })
    } else {
        None
    };

    let payload = GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE".to_string()],
            image_config,
        },
    };

    Ok(BuiltPayload {
        endpoint: Endpoint::generate_content(&settings.image_model),
        body: apply_naming(serde_json::to_value(&payload)?, settings.field_naming),
    })
}

fn vision_chat(
    image: &str,
    system_instruction: &str,
    instruction: &str,
    temperature: f64,
    settings: &ModelSettings,
) -> Result<BuiltPayload> {
    let data_url = format!(
        "data:{};base64,{}",
        FORWARDED_IMAGE_MIME,
        compact_base64(image)
    );

    let request = ChatCompletionRequest {
        model: settings.analyze_model.clone(),
        messages: vec![
            ChatMessage::system(system_instruction),
            ChatMessage::user(ChatMessageContent::Parts(vec![
                MessagePart::text(instruction),
                MessagePart::image_url(data_url),
            ])),
        ],
        temperature,
    };

    Ok(BuiltPayload {
        endpoint: Endpoint::ChatCompletions,
        body: serde_json::to_value(&request)?,
    })
}

/// Rewrite every object key of a camelCase payload into the chosen convention.
///
/// Payload types serialize in camelCase, so the whole body switches at once
/// and conventions can never mix within one request.
pub fn apply_naming(value: Value, naming: FieldNaming) -> Value {
    match naming {
        FieldNaming::CamelCase => value,
        FieldNaming::SnakeCase => snake_case_keys(value),
    }
}

fn snake_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (camel_to_snake(&key), snake_case_keys(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(snake_case_keys).collect()),
        other => other,
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (idx, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;
    use crate::validation::fixtures::png_base64;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings() -> ModelSettings {
        ModelSettings::default()
    }

    fn parts(payload: &BuiltPayload) -> &Vec<Value> {
        payload.body["contents"][0]["parts"].as_array().unwrap()
    }

    #[test]
    fn test_text_to_image_has_only_text_part() {
        let prompt = "a".repeat(20);
        for (ratio, resolution) in [
            (Some("1:1".to_string()), Some(Resolution::OneK)),
            (Some("16:9".to_string()), Some(Resolution::FourK)),
            (None, None),
        ] {
            let request = GenerateRequest::new(prompt.clone())
                .with_aspect_ratio(ratio)
                .with_resolution(resolution);
            let payload = build_generate(&request, &settings()).unwrap();

            assert_eq!(parts(&payload), &vec![json!({ "text": prompt })]);
        }
    }

    #[test]
    fn test_blank_reference_is_text_to_image() {
        let request = GenerateRequest::new("a".repeat(20)).with_reference_image(" \n ");
        let payload = build_generate(&request, &settings()).unwrap();
        assert_eq!(parts(&payload).len(), 1);
    }

    #[test]
    fn test_image_to_image_puts_image_part_first() {
        let reference = png_base64();
        let request = GenerateRequest::new("a".repeat(20)).with_reference_image(reference.clone());
        let payload = build_generate(&request, &settings()).unwrap();

        assert_eq!(
            parts(&payload),
            &vec![
                json!({ "inlineData": { "mimeType": "image/jpeg", "data": reference } }),
                json!({ "text": "a".repeat(20) }),
            ]
        );
    }

    #[test]
    fn test_reference_data_url_prefix_is_not_forwarded() {
        let reference = png_base64();
        let request = GenerateRequest::new("a".repeat(20))
            .with_reference_image(format!("data:image/png;base64,{}", reference));
        let payload = build_generate(&request, &settings()).unwrap();

        assert_eq!(parts(&payload)[0]["inlineData"]["data"], json!(reference));
    }

    #[test]
    fn test_generate_payload_shape_and_endpoint() {
        let payload = build_generate(&GenerateRequest::new("a calm studio shot"), &settings())
            .unwrap();

        assert_eq!(
            payload.endpoint,
            Endpoint::generate_content("gemini-3-pro-image-preview")
        );
        assert_eq!(
            payload.body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": "a calm studio shot" }]
                }],
                "generationConfig": {
                    "responseModalities": ["IMAGE"],
                    "imageConfig": { "aspectRatio": "1:1", "imageSize": "1K" }
                }
            })
        );
    }

    #[test]
    fn test_image_config_fields_are_independent() {
        let only_size = GenerateRequest::new("prompt text")
            .with_aspect_ratio(None)
            .with_resolution(Some(Resolution::TwoK));
        let payload = build_generate(&only_size, &settings()).unwrap();
        assert_eq!(
            payload.body["generationConfig"]["imageConfig"],
            json!({ "imageSize": "2K" })
        );

        let only_ratio = GenerateRequest::new("prompt text")
            .with_aspect_ratio(Some("9:16".to_string()))
            .with_resolution(None);
        let payload = build_generate(&only_ratio, &settings()).unwrap();
        assert_eq!(
            payload.body["generationConfig"]["imageConfig"],
            json!({ "aspectRatio": "9:16" })
        );

        let neither = GenerateRequest::new("prompt text")
            .with_aspect_ratio(Some(String::new()))
            .with_resolution(None);
        let payload = build_generate(&neither, &settings()).unwrap();
        assert_eq!(
            payload.body["generationConfig"],
            json!({ "responseModalities": ["IMAGE"] })
        );
    }

    #[test]
    fn test_snake_case_naming_applies_to_whole_payload() {
        let settings = ModelSettings {
            field_naming: FieldNaming::SnakeCase,
            ..ModelSettings::default()
        };
        let request = GenerateRequest::new("a".repeat(20)).with_reference_image("QUJD");
        let payload = build_generate(&request, &settings).unwrap();

        assert_eq!(
            payload.body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "inline_data": { "mime_type": "image/jpeg", "data": "QUJD" } },
                        { "text": "a".repeat(20) }
                    ]
                }],
                "generation_config": {
                    "response_modalities": ["IMAGE"],
                    "image_config": { "aspect_ratio": "1:1", "image_size": "1K" }
                }
            })
        );
    }

    #[test]
    fn test_naming_never_touches_values() {
        let value = json!({ "someKey": "camelValue", "list": [{ "innerKey": 1 }] });
        assert_eq!(
            apply_naming(value, FieldNaming::SnakeCase),
            json!({ "some_key": "camelValue", "list": [{ "inner_key": 1 }] })
        );
    }

    #[test]
    fn test_analyze_payload_is_vision_chat() {
        let image = png_base64();
        let payload = build_analyze(&image, "system text", &settings()).unwrap();

        assert_eq!(payload.endpoint, Endpoint::ChatCompletions);
        assert_eq!(
            payload.body,
            json!({
                "model": "gemini-2.5-pro",
                "messages": [
                    { "role": "system", "content": "system text" },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text", "text": prompts::ANALYZE_USER },
                            {
                                "type": "image_url",
                                "image_url": { "url": format!("data:image/jpeg;base64,{}", image) }
                            }
                        ]
                    }
                ],
                "temperature": 0.7
            })
        );
    }

    #[test]
    fn test_recognize_uses_lower_temperature() {
        let payload = build_recognize("QUJD", "identify", &settings()).unwrap();
        assert_eq!(payload.body["temperature"], json!(0.3));
        assert_eq!(
            payload.body["messages"][1]["content"][0]["text"],
            json!(prompts::RECOGNIZE_USER)
        );
    }

    #[test]
    fn test_fuse_payload_embeds_both_sections() {
        let payload = build_fuse(
            "Product centered on white marble",
            "Glass perfume bottle",
            "fuse them",
            &settings(),
        )
        .unwrap();

        assert_eq!(payload.endpoint, Endpoint::ChatCompletions);
        assert_eq!(payload.body["temperature"], json!(0.7));
        assert_eq!(
            payload.body["messages"][1]["content"],
            json!(
                "## Competitor analysis template\n\nProduct centered on white marble\n\n\
                 ## Target product information\n\nGlass perfume bottle"
            )
        );
    }

    #[test]
    fn test_fuse_keeps_placeholder_text_in_analysis() {
        let payload = build_fuse(
            "Center the {{product}} on marble, soft light",
            "Glass perfume bottle",
            "fuse them",
            &settings(),
        )
        .unwrap();

        assert_eq!(
            payload.body["messages"][1]["content"],
            json!(
                "## Competitor analysis template\n\nCenter the {{product}} on marble, soft light\n\n\
                 ## Target product information\n\nGlass perfume bottle"
            )
        );
    }

    #[test]
    fn test_line_wrapped_reference_is_forwarded_compact() {
        let reference = png_base64();
        let (head, tail) = reference.split_at(reference.len() / 2);
        let wrapped = format!("{}\r\n{}\n", head, tail);

        let request = GenerateRequest::new("a".repeat(20)).with_reference_image(wrapped.clone());
        let payload = build_generate(&request, &settings()).unwrap();
        assert_eq!(parts(&payload)[0]["inlineData"]["data"], json!(reference));

        let payload = build_analyze(&wrapped, "sys", &settings()).unwrap();
        assert_eq!(
            payload.body["messages"][1]["content"][1]["image_url"]["url"],
            json!(format!("data:image/jpeg;base64,{}", reference))
        );
    }

    #[test]
    fn test_build_dispatches_on_operation_kind() {
        let request = OperationRequest::Fuse {
            analysis: "analysis text here".to_string(),
            product_info: "mug".to_string(),
            system_instruction: "sys".to_string(),
        };
        let payload = build(&request, &settings()).unwrap();
        assert_eq!(payload.endpoint, Endpoint::ChatCompletions);

        let request = OperationRequest::Generate(GenerateRequest::new("prompt text"));
        let payload = build(&request, &settings()).unwrap();
        assert!(matches!(payload.endpoint, Endpoint::GenerateContent { .. }));
    }
}
