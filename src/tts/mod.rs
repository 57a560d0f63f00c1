//! Text-to-speech through the Google Cloud REST API, with audio kept in a Supabase bucket.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Tts;

const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
pub const DEFAULT_LANGUAGE: &str = "vi-VN";

pub type TtsResult<T> = std::result::Result<T, TtsError>;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("text-to-speech is not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid audio payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("upstream error: {0}")]
    Upstream(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
    pitch: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Object name of the audio generated for a page block.
pub fn audio_object_name(page_block_id: Uuid) -> String {
    format!("pageblock-{page_block_id}.mp3")
}

pub fn upload_url(config: &Tts, object: &str) -> String {
    format!(
        "{}/storage/v1/object/{}/{}",
        config.supabase_url(),
        config.bucket(),
        object
    )
}

pub fn public_url(config: &Tts, object: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        config.supabase_url(),
        config.bucket(),
        object
    )
}

/// MP3 audio of `text` spoken with a neutral voice.
pub async fn synthesize(http: &reqwest::Client, config: &Tts, text: &str, lang: &str) -> TtsResult<Vec<u8>> {
    let body = SynthesizeRequest {
        input: SynthesisInput { text },
        voice: VoiceSelection {
            language_code: lang,
            ssml_gender: "NEUTRAL",
        },
        audio_config: AudioConfig {
            audio_encoding: "MP3",
            speaking_rate: 1.0,
            pitch: 0.0,
        },
    };

    let response = http
        .post(SYNTHESIZE_URL)
        .query(&[("key", config.google_api_key())])
        .json(&body)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(TtsError::Upstream(format!("synthesize returned {status}: {detail}")));
    }

    let payload: SynthesizeResponse = response.json().await?;
    let audio = payload
        .audio_content
        .filter(|a| !a.is_empty())
        .ok_or_else(|| TtsError::Upstream("no audio content in response".to_string()))?;
    Ok(STANDARD.decode(audio)?)
}

/// Uploads (or overwrites) the audio of a page block and returns its public URL.
pub async fn upload_audio(
    http: &reqwest::Client,
    config: &Tts,
    page_block_id: Uuid,
    audio: Vec<u8>,
) -> TtsResult<String> {
    let object = audio_object_name(page_block_id);
    let response = http
        .post(upload_url(config, &object))
        .bearer_auth(config.supabase_key())
        .header("apikey", config.supabase_key())
        .header("x-upsert", "true")
        .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
        .body(audio)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(TtsError::Upstream(format!("storage upload returned {status}: {detail}")));
    }

    Ok(public_url(config, &object))
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> Tts {
        toml::from_str(
            r#"
            google_api_key = "key"
            supabase_url = "https://demo.supabase.co/"
            supabase_key = "service"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn storage_urls() {
        let id = Uuid::nil();
        let object = audio_object_name(id);
        assert_eq!(object, "pageblock-00000000-0000-0000-0000-000000000000.mp3");

        let config = config();
        assert_eq!(
            upload_url(&config, &object),
            format!("https://demo.supabase.co/storage/v1/object/tts-audio/{object}")
        );
        assert_eq!(
            public_url(&config, &object),
            format!("https://demo.supabase.co/storage/v1/object/public/tts-audio/{object}")
        );
    }

    #[test]
    fn request_body_shape() {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: "Xin chào" },
            voice: VoiceSelection {
                language_code: DEFAULT_LANGUAGE,
                ssml_gender: "NEUTRAL",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 1.0,
                pitch: 0.0,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["input"]["text"], "Xin chào");
        assert_eq!(value["voice"]["languageCode"], "vi-VN");
        assert_eq!(value["voice"]["ssmlGender"], "NEUTRAL");
        assert_eq!(value["audioConfig"]["audioEncoding"], "MP3");
    }
}
