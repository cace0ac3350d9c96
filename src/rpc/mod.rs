//! Transport-agnostic RPC subsystem.
//!
//! Framed, address-multiplexed RPC over ordered byte streams.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RPC Stack                            │
//! │                                                              │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────────────────┐  │
//! │  │  Ingest  │──▶│  Codec   │──▶│  Engine (dispatcher)     │  │
//! │  │ (Read)   │   │ (framing)│   │  → Registry → handlers   │  │
//! │  └──────────┘   └──────────┘   └──────────────────────────┘  │
//! │                                        │                     │
//! │       ┌────────────────────────────────┘                     │
//! │       ▼                                                      │
//! │  ┌──────────┐   ┌───────────┐   ┌─────────────────────────┐  │
//! │  │  Fanout  │──▶│ Transport │   │ Session (sensor push)   │  │
//! │  │ (Mutex)  │   │ serial|tcp│◀──│  → StreamSlot → Fanout  │  │
//! │  └──────────┘   └───────────┘   └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod fanout;
pub mod ingest;
pub mod packet;
pub mod registry;
pub mod session;
pub mod stream;
pub mod transport;
