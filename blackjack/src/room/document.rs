//! Wire shape of the shared room document.
//!
//! Field names are the contract other room clients already read and
//! write; they are kept verbatim. Conversion to and from [`Round`] is
//! strict: an unrecognized card token, phase tag, or result tag fails
//! instead of defaulting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::{GameError, Hand, Outcome, PlayerId, Rank, Round, RoundPhase, round::Player};

/// `tipo_juego` tag for blackjack rooms.
pub const GAME_TYPE_BLACKJACK: &str = "BlackJack";
/// Collection holding live rooms.
pub const ACTIVE_ROOMS: &str = "salas_activas";
/// Collection holding archived rooms.
pub const ROOM_HISTORY: &str = "historial_salas";
/// Default seat capacity for a new room.
pub const DEFAULT_CAPACITY: usize = 4;

const ESTADO_ESPERANDO: &str = "esperando";
const ESTADO_EN_CURSO: &str = "en_curso";
const ESTADO_CRUPIER: &str = "crupier";
const ESTADO_TERMINADA: &str = "terminada";

const RESULTADO_GANA: &str = "gana";
const RESULTADO_PIERDE: &str = "pierde";
const RESULTADO_EMPATE: &str = "empate";

/// One player's hand as stored remotely. `puntos` is redundant with
/// `cartas` but other clients render it without rescoring.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandRecord {
    pub cartas: Vec<String>,
    pub puntos: u8,
    pub plantado: bool,
}

/// One player's final result.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub jugador: String,
    pub resultado: String,
}

/// The live room document.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoomDocument {
    pub tipo_juego: String,
    pub capacidad: usize,
    pub jugadores: Vec<String>,
    pub estado: String,
    pub manos_jugadores: BTreeMap<String, HandRecord>,
    pub mano_crupier: Vec<String>,
    pub turno_actual: usize,
    pub juego_terminado: bool,
    pub resultados: Vec<OutcomeRecord>,
    pub actualizada_en: DateTime<Utc>,
}

/// Terminal record written to [`ROOM_HISTORY`] when a room closes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ArchiveRecord {
    pub sala: RoomDocument,
    pub archivada_en: DateTime<Utc>,
}

fn estado_token(phase: RoundPhase) -> &'static str {
    match phase {
        RoundPhase::Waiting => ESTADO_ESPERANDO,
        RoundPhase::InProgress => ESTADO_EN_CURSO,
        RoundPhase::DealerTurn => ESTADO_CRUPIER,
        RoundPhase::Finished => ESTADO_TERMINADA,
    }
}

pub(crate) fn phase_from_estado(estado: &str) -> Result<RoundPhase, GameError> {
    match estado {
        ESTADO_ESPERANDO => Ok(RoundPhase::Waiting),
        ESTADO_EN_CURSO => Ok(RoundPhase::InProgress),
        ESTADO_CRUPIER => Ok(RoundPhase::DealerTurn),
        ESTADO_TERMINADA => Ok(RoundPhase::Finished),
        other => Err(GameError::InvalidState(format!(
            "unknown room state `{other}`"
        ))),
    }
}

fn resultado_token(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Win => RESULTADO_GANA,
        Outcome::Lose => RESULTADO_PIERDE,
        Outcome::Push => RESULTADO_EMPATE,
    }
}

fn outcome_from_resultado(resultado: &str) -> Result<Outcome, GameError> {
    match resultado {
        RESULTADO_GANA => Ok(Outcome::Win),
        RESULTADO_PIERDE => Ok(Outcome::Lose),
        RESULTADO_EMPATE => Ok(Outcome::Push),
        other => Err(GameError::InvalidState(format!(
            "unknown result `{other}`"
        ))),
    }
}

fn hand_tokens(hand: &Hand) -> Vec<String> {
    hand.cards()
        .iter()
        .map(|card| card.0.token().to_string())
        .collect()
}

fn hand_from_tokens(tokens: &[String]) -> Result<Hand, GameError> {
    tokens
        .iter()
        .map(|token| Rank::from_token(token).map(crate::game::Card))
        .collect()
}

impl RoomDocument {
    /// Snapshot a round into its wire shape.
    #[must_use]
    pub fn from_round(round: &Round, capacidad: usize) -> Self {
        let manos_jugadores = round
            .players()
            .iter()
            .map(|player| {
                (
                    player.id().to_string(),
                    HandRecord {
                        cartas: hand_tokens(player.hand()),
                        puntos: player.hand().total(),
                        plantado: player.stood(),
                    },
                )
            })
            .collect();
        let resultados = round
            .players()
            .iter()
            .filter_map(|player| {
                round.outcomes().get(player.id()).map(|outcome| OutcomeRecord {
                    jugador: player.id().to_string(),
                    resultado: resultado_token(*outcome).to_string(),
                })
            })
            .collect();
        Self {
            tipo_juego: GAME_TYPE_BLACKJACK.to_string(),
            capacidad,
            jugadores: round.players().iter().map(|p| p.id().to_string()).collect(),
            estado: estado_token(round.phase()).to_string(),
            manos_jugadores,
            mano_crupier: hand_tokens(round.dealer_hand()),
            turno_actual: round.active_player_index().unwrap_or(0),
            juego_terminado: round.phase() == RoundPhase::Finished,
            resultados,
            actualizada_en: Utc::now(),
        }
    }

    /// Reconstruct a round from the remote document. Round invariants
    /// are re-validated; a document this client cannot trust is an
    /// error, never a guess.
    pub fn to_round(&self, room_id: &str) -> Result<Round, GameError> {
        let phase = phase_from_estado(&self.estado)?;
        let mut players = Vec::with_capacity(self.jugadores.len());
        for id in &self.jugadores {
            let (hand, stood) = match self.manos_jugadores.get(id) {
                Some(record) => (hand_from_tokens(&record.cartas)?, record.plantado),
                None => (Hand::new(), false),
            };
            players.push(Player::from_parts(PlayerId::new(id), hand, stood));
        }
        let dealer_hand = hand_from_tokens(&self.mano_crupier)?;
        let mut outcomes = BTreeMap::new();
        for record in &self.resultados {
            outcomes.insert(
                PlayerId::new(&record.jugador),
                outcome_from_resultado(&record.resultado)?,
            );
        }
        Round::from_parts(
            room_id.to_string(),
            players,
            dealer_hand,
            self.turno_actual,
            phase,
            outcomes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Card;

    fn seated(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| PlayerId::new(n)).collect()
    }

    fn card(token: &str) -> Card {
        Card(Rank::from_token(token).unwrap())
    }

    fn in_progress_round() -> Round {
        let mut round = Round::new("r1".to_string(), &seated(&["ana", "ben"])).unwrap();
        round.deal_to_player(0, card("10"));
        round.deal_to_player(0, card("6"));
        round.deal_to_player(1, card("A"));
        round.deal_to_player(1, card("9"));
        round.deal_to_dealer(card("K"));
        round.deal_to_dealer(card("7"));
        round.set_phase(RoundPhase::InProgress);
        round
    }

    #[test]
    fn round_document_roundtrip() {
        let round = in_progress_round();
        let doc = RoomDocument::from_round(&round, 4);

        assert_eq!(doc.tipo_juego, GAME_TYPE_BLACKJACK);
        assert_eq!(doc.estado, "en_curso");
        assert_eq!(doc.jugadores, vec!["ana", "ben"]);
        assert_eq!(doc.mano_crupier, vec!["K", "7"]);
        assert_eq!(doc.turno_actual, 0);
        assert!(!doc.juego_terminado);
        assert_eq!(doc.manos_jugadores["ana"].puntos, 16);
        assert_eq!(doc.manos_jugadores["ben"].puntos, 20);

        let back = doc.to_round("r1").unwrap();
        assert_eq!(back.phase(), RoundPhase::InProgress);
        assert_eq!(back.players().len(), 2);
        assert_eq!(back.players()[0].hand().total(), 16);
        assert_eq!(back.dealer_hand().total(), 17);
        assert_eq!(back.active_player_index(), Some(0));
    }

    #[test]
    fn finished_round_carries_results() {
        let mut round = in_progress_round();
        round.mark_stood(0).unwrap();
        round.mark_stood(1).unwrap();
        round.set_phase(RoundPhase::DealerTurn);
        let outcomes = BTreeMap::from([
            (PlayerId::new("ana"), Outcome::Lose),
            (PlayerId::new("ben"), Outcome::Win),
        ]);
        round.finish(outcomes).unwrap();

        let doc = RoomDocument::from_round(&round, 4);
        assert_eq!(doc.estado, "terminada");
        assert!(doc.juego_terminado);
        assert_eq!(doc.resultados.len(), 2);
        assert_eq!(doc.resultados[0].jugador, "ana");
        assert_eq!(doc.resultados[0].resultado, "pierde");

        let back = doc.to_round("r1").unwrap();
        assert_eq!(back.phase(), RoundPhase::Finished);
        assert_eq!(back.outcomes().get(&PlayerId::new("ben")), Some(&Outcome::Win));
    }

    #[test]
    fn unknown_estado_is_rejected() {
        let mut doc = RoomDocument::from_round(&in_progress_round(), 4);
        doc.estado = "pausada".to_string();
        let err = doc.to_round("r1").unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[test]
    fn unknown_card_token_is_rejected() {
        let mut doc = RoomDocument::from_round(&in_progress_round(), 4);
        doc.mano_crupier = vec!["K".to_string(), "joker".to_string()];
        let err = doc.to_round("r1").unwrap_err();
        assert_eq!(err, GameError::InvalidCard("joker".to_string()));
    }

    #[test]
    fn unknown_resultado_is_rejected() {
        let mut round = in_progress_round();
        round.mark_stood(0).unwrap();
        round.mark_stood(1).unwrap();
        round.set_phase(RoundPhase::DealerTurn);
        round
            .finish(BTreeMap::from([
                (PlayerId::new("ana"), Outcome::Lose),
                (PlayerId::new("ben"), Outcome::Win),
            ]))
            .unwrap();
        let mut doc = RoomDocument::from_round(&round, 4);
        doc.resultados[0].resultado = "gana mucho".to_string();
        assert!(doc.to_round("r1").is_err());
    }

    #[test]
    fn oversized_remote_hand_is_rejected() {
        let mut doc = RoomDocument::from_round(&in_progress_round(), 4);
        doc.manos_jugadores.get_mut("ana").unwrap().cartas = vec!["A".to_string(); 26];
        let err = doc.to_round("r1").unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[test]
    fn duplicated_jugadores_are_rejected() {
        let mut doc = RoomDocument::from_round(&in_progress_round(), 4);
        doc.jugadores.push("ana".to_string());
        let err = doc.to_round("r1").unwrap_err();
        assert_eq!(err, GameError::DuplicatePlayer(PlayerId::new("ana")));
    }

    #[test]
    fn finished_document_without_results_is_rejected() {
        let mut doc = RoomDocument::from_round(&in_progress_round(), 4);
        doc.estado = "terminada".to_string();
        doc.juego_terminado = true;
        assert!(doc.to_round("r1").is_err());
    }

    #[test]
    fn waiting_room_has_no_cards() {
        let round = Round::new("r1".to_string(), &seated(&["ana"])).unwrap();
        let doc = RoomDocument::from_round(&round, 4);
        assert_eq!(doc.estado, "esperando");
        assert!(doc.mano_crupier.is_empty());
        let back = doc.to_round("r1").unwrap();
        assert_eq!(back.phase(), RoundPhase::Waiting);
    }
}
