pub mod interface;
pub mod json;
pub mod params;

pub use interface::{
    into_interface, ForeignTalkEngine, SampleSink, TalkEngine, TalkSampleRef,
};
pub use json::ParseError;
pub use params::{CastInfo, ParamFlag, TalkParams, MAX_PARAMS};
