//! `chipperpb` wire messages
//!
//! Only the fields the session layer touches are defined here; unknown
//! fields sent by newer clients are skipped by the decoder.

use chipper_core::{AudioCodec, IntentResponse, LanguageTag, SessionMessage};

/// One client message of a `StreamingIntentGraph` call
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingIntentGraphRequest {
    #[prost(string, tag = "1")]
    pub session: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub device_id: ::prost::alloc::string::String,
    #[prost(enumeration = "LanguageCode", tag = "3")]
    pub language_code: i32,
    #[prost(enumeration = "AudioEncoding", tag = "4")]
    pub audio_encoding: i32,
    #[prost(bytes = "vec", tag = "5")]
    pub input_audio: ::prost::alloc::vec::Vec<u8>,
    #[prost(enumeration = "RobotMode", tag = "6")]
    pub mode: i32,
    #[prost(string, tag = "7")]
    pub firmware_version: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub boot_id: ::prost::alloc::string::String,
}

/// One server message of a `StreamingIntentGraph` call
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingIntentGraphResponse {
    #[prost(string, tag = "1")]
    pub session: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub device_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub intent_result: ::core::option::Option<IntentResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntentResult {
    #[prost(string, tag = "1")]
    pub action: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub query_text: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub parameters:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    #[prost(bool, tag = "4")]
    pub is_final: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LanguageCode {
    EnglishUs = 0,
    EnglishUk = 1,
    EnglishAu = 2,
    German = 3,
    French = 4,
    Japanese = 5,
}

impl LanguageCode {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            LanguageCode::EnglishUs => "ENGLISH_US",
            LanguageCode::EnglishUk => "ENGLISH_UK",
            LanguageCode::EnglishAu => "ENGLISH_AU",
            LanguageCode::German => "GERMAN",
            LanguageCode::French => "FRENCH",
            LanguageCode::Japanese => "JAPANESE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AudioEncoding {
    LinearPcm = 0,
    OggOpus = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RobotMode {
    VoiceCommand = 0,
    Game = 1,
}

impl SessionMessage for StreamingIntentGraphRequest {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn session_id(&self) -> &str {
        &self.session
    }

    fn language_tag(&self) -> LanguageTag {
        match LanguageCode::try_from(self.language_code) {
            Ok(code) => LanguageTag::new(code.as_str_name()),
            // keep what the client sent
            Err(_) => LanguageTag::new(format!("LANGUAGE_CODE_{}", self.language_code)),
        }
    }

    fn audio_codec(&self) -> AudioCodec {
        match AudioEncoding::try_from(self.audio_encoding) {
            Ok(AudioEncoding::LinearPcm) => AudioCodec::Pcm16,
            Ok(AudioEncoding::OggOpus) => AudioCodec::OggOpus,
            Err(_) => AudioCodec::Unknown(self.audio_encoding),
        }
    }

    fn audio(&self) -> &[u8] {
        &self.input_audio
    }
}

impl From<IntentResponse> for StreamingIntentGraphResponse {
    fn from(response: IntentResponse) -> Self {
        Self {
            session: response.session_id,
            device_id: response.device_id,
            intent_result: Some(IntentResult {
                action: response.intent,
                query_text: response.query_text,
                parameters: response.parameters.into_iter().collect(),
                is_final: response.is_final,
            }),
        }
    }
}
