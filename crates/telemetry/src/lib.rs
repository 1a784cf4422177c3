// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging, tracing, and panic-hook setup shared by lsmforge binaries and
//! their test suites.

pub mod logging;
pub mod panic_hook;

pub use logging::{
    LogFormat, LoggingOptions, OtlpExportProtocol, TracingOptions, empty_string_as_default,
    init_default_ut_logging, init_global_logging, init_tracing_subscriber,
};
pub use panic_hook::set_panic_hook;
