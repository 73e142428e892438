//! # viterbi-core — Decodificador de Viterbi de Ordem Generalizada
//!
//! Este crate encontra a sequência de estados ocultos mais provável para uma
//! sequência de observações, sob uma hipótese de Markov de ordem
//! configurável (1, 2 ou N). Ele é o núcleo de decodificação usado por
//! taggers de sequência (classes gramaticais, NER, ...), mas não conhece
//! nenhum deles: os modelos de probabilidade são fornecidos pelo chamador.
//!
//! ## Arquitetura
//!
//! 1.  **Histórico** ([`history`]): cadeia persistente de estados numa arena,
//!     compartilhada entre caminhos que divergem.
//! 2.  **Redução** ([`reduction`]): resume o histórico recente na chave que o
//!     modelo de transição precisa.
//! 3.  **Modelos** ([`model`], [`table`]): contratos de emissão e transição, e
//!     implementações em tabela.
//! 4.  **Decodificador** ([`viterbi`]): `advance` → `beam_filter` → `end`.
//!
//! Todas as probabilidades são **log10**.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use viterbi_core::{EmissionTable, TransitionTable, Viterbi};
//!
//! // P(palavra | classe)
//! let mut emissions: EmissionTable<&str, String> = EmissionTable::new();
//! emissions.insert_probability("the".to_string(), "DET", 1.0);
//! emissions.insert_probability("can".to_string(), "NOUN", 0.4);
//! emissions.insert_probability("can".to_string(), "VERB", 0.6);
//! emissions.insert_probability("rusts".to_string(), "VERB", 1.0);
//!
//! // P(classe | classe anterior)
//! let mut transitions: TransitionTable<&str, &str> = TransitionTable::new();
//! transitions.insert_probability("<s>", "DET", 1.0);
//! transitions.insert_probability("DET", "NOUN", 0.9);
//! transitions.insert_probability("DET", "VERB", 0.1);
//! transitions.insert_probability("NOUN", "VERB", 0.8);
//! transitions.insert_probability("VERB", "</s>", 1.0);
//!
//! let mut viterbi = Viterbi::first_order(&emissions, &transitions, ["<s>"])?;
//! for word in ["the", "can", "rusts"] {
//!     viterbi.advance(word)?;
//!     viterbi.beam_filter(5.0)?;
//! }
//! let best = viterbi.end(&"?", &"</s>")?;
//! assert_eq!(best.states, vec!["DET", "NOUN", "VERB"]);
//! # Ok::<(), viterbi_core::DecoderError>(())
//! ```
//!
//! ## Módulos Principais
//!
//! - [`viterbi`]: o decodificador e os laços completos [`decode`] e
//!   [`decode_sequential`] (para modelos que não são `Sync`).
//! - [`config`]: parâmetros de beam e paralelismo.
//! - [`error`]: erros de construção e de operação.

pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod reduction;
pub mod table;
pub mod viterbi;

pub use config::DecoderConfig;
pub use error::{DecoderError, Result};
pub use history::{Ancestor, HistoryArena, Lineage, NodeId};
pub use model::{Candidate, EmissionProbabilityModel, TransitionProbabilityModel};
pub use reduction::{MostRecent, RecentPair, RecentStates, Reducer};
pub use table::{EmissionTable, TransitionTable};
pub use viterbi::{decode, decode_sequential, Decoding, FrontierSnapshot, StepOutcome, Viterbi};
