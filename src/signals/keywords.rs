use std::collections::BTreeSet;

use super::{
    DangerLevel, DistanceBand, Horizontal, SearchDetails, SearchSignal, SignalExtractor,
    TrafficLight, TrafficSignal, Vertical,
};

const FOUND_MARKER: &str = "objeto encontrado";

const SUPERIOR_WORDS: &[&str] = &["superior", "cima", "alto"];
const INFERIOR_WORDS: &[&str] = &["inferior", "baixo"];

const FAR_WORDS: &[&str] = &["distante", "longe", "fundo"];
const NEAR_WORDS: &[&str] = &["perto", "próximo", "frente"];
const MEDIUM_WORDS: &[&str] = &["médio", "meio"];

const CRITICAL_WORDS: &[&str] = &["perigo crítico", "não atravesse"];
const DANGER_WORDS: &[&str] = &["perigo", "atenção máxima"];
const CAUTION_WORDS: &[&str] = &["cuidado", "atenção"];

const VEHICLE_WORDS: &[&str] = &[
    "carro",
    "moto",
    "ônibus",
    "caminhão",
    "bicicleta",
    "patinete",
    "veículo",
];

/// (keywords, sign name)
const SIGN_WORDS: &[(&[&str], &str)] = &[
    (&["pare", "stop"], "PARE"),
    (&["preferência"], "Dê a Preferência"),
    (&["proibido"], "Proibido"),
    (&["velocidade"], "Limite de Velocidade"),
];

const RED_LIGHT: &[&str] = &["semáforo vermelho", "sinal vermelho"];
const GREEN_LIGHT: &[&str] = &["semáforo verde", "sinal verde"];
const YELLOW_LIGHT: &[&str] = &["semáforo amarelo", "sinal amarelo"];

const SAFE_TO_CROSS: &[&str] = &["seguro atravessar", "pode atravessar"];
const UNSAFE_TO_CROSS: &[&str] = &["não atravesse", "não é seguro"];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

/// Text after `KEY:` on the first line whose label ends with `key` (case-insensitive).
fn labelled_line(description: &str, key: &str) -> Option<String> {
    description.lines().find_map(|line| {
        let (head, tail) = line.split_once(':')?;
        let value = tail.trim();
        (head.trim().to_lowercase().ends_with(key) && !value.is_empty())
            .then(|| value.to_string())
    })
}

/// Case-insensitive Portuguese keyword matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SignalExtractor for KeywordExtractor {
    fn search(&self, description: &str) -> SearchSignal {
        let text = description.to_lowercase();
        if !text.contains(FOUND_MARKER) {
            return SearchSignal::default();
        }

        let horizontal = if text.contains("esquerda") {
            Some(Horizontal::Esquerda)
        } else if text.contains("direita") {
            Some(Horizontal::Direita)
        } else {
            None
        };

        let vertical = if contains_any(&text, SUPERIOR_WORDS) {
            Some(Vertical::Superior)
        } else if contains_any(&text, INFERIOR_WORDS) {
            Some(Vertical::Inferior)
        } else {
            None
        };

        let distance_band = if contains_any(&text, FAR_WORDS) {
            DistanceBand::Far
        } else if contains_any(&text, NEAR_WORDS) {
            DistanceBand::Near
        } else if contains_any(&text, MEDIUM_WORDS) {
            DistanceBand::Medium
        } else {
            DistanceBand::Near
        };

        SearchSignal {
            found: true,
            horizontal,
            vertical,
            distance_band: Some(distance_band),
            details: SearchDetails {
                position: labelled_line(description, "posição"),
                distance: labelled_line(description, "distância"),
                navigation: labelled_line(description, "navegação"),
            },
        }
    }

    fn traffic(&self, description: &str) -> TrafficSignal {
        let text = description.to_lowercase();

        let danger_level = if contains_any(&text, CRITICAL_WORDS) {
            DangerLevel::Critical
        } else if contains_any(&text, DANGER_WORDS) {
            DangerLevel::Danger
        } else if contains_any(&text, CAUTION_WORDS) {
            DangerLevel::Caution
        } else {
            DangerLevel::Safe
        };

        let vehicles: BTreeSet<String> = VEHICLE_WORDS
            .iter()
            .filter(|word| text.contains(*word))
            .map(|word| word.to_string())
            .collect();

        let signs: BTreeSet<String> = SIGN_WORDS
            .iter()
            .filter(|(words, _)| contains_any(&text, words))
            .map(|(_, name)| name.to_string())
            .collect();

        let traffic_light = if contains_any(&text, RED_LIGHT) {
            Some(TrafficLight::Red)
        } else if contains_any(&text, GREEN_LIGHT) {
            Some(TrafficLight::Green)
        } else if contains_any(&text, YELLOW_LIGHT) {
            Some(TrafficLight::Yellow)
        } else {
            None
        };

        let safe_to_cross = if contains_any(&text, SAFE_TO_CROSS) {
            Some(true)
        } else if contains_any(&text, UNSAFE_TO_CROSS) {
            Some(false)
        } else {
            None
        };

        TrafficSignal {
            danger_level,
            vehicles,
            signs,
            crosswalk_detected: text.contains("faixa") && text.contains("pedestre"),
            traffic_light,
            safe_to_cross,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::SearchLocation;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn found_object_yields_location_and_distance() {
        let signal = KeywordExtractor.search(
            "OBJETO ENCONTRADO: caneca. Está à direita superior da mesa, próximo da câmera.",
        );
        assert!(signal.found);
        assert_eq!(SearchLocation::from(&signal).label(), "direita superior");
        assert_eq!(signal.distance_band, Some(DistanceBand::Near));
    }

    #[test]
    fn found_marker_is_case_insensitive() {
        let signal = KeywordExtractor.search("objeto encontrado ao fundo, à esquerda, embaixo");
        assert!(signal.found);
        assert_eq!(signal.horizontal, Some(Horizontal::Esquerda));
        assert_eq!(signal.vertical, Some(Vertical::Inferior));
        assert_eq!(signal.distance_band, Some(DistanceBand::Far));
    }

    #[test]
    fn distance_defaults_to_near_and_location_to_centre() {
        let signal = KeywordExtractor.search("OBJETO ENCONTRADO na imagem");
        assert_eq!(signal.distance_band, Some(DistanceBand::Near));
        assert_eq!(SearchLocation::from(&signal).label(), "centro");

        let medium = KeywordExtractor.search("OBJETO ENCONTRADO no meio da sala");
        assert_eq!(medium.distance_band, Some(DistanceBand::Medium));
    }

    #[test]
    fn missing_marker_means_not_found() {
        let signal = KeywordExtractor.search("Vejo uma caneca à direita, bem perto.");
        assert_eq!(signal, SearchSignal::default());
        assert_eq!(KeywordExtractor.search(""), SearchSignal::default());
    }

    #[test]
    fn labelled_lines_are_kept_verbatim() {
        let signal = KeywordExtractor.search(
            "OBJETO ENCONTRADO\nPOSIÇÃO: canto superior direito\nDistância: cerca de 1 metro\nNAVEGAÇÃO: dê dois passos à frente",
        );
        assert_eq!(
            signal.details.position.as_deref(),
            Some("canto superior direito")
        );
        assert_eq!(signal.details.distance.as_deref(), Some("cerca de 1 metro"));
        assert_eq!(
            signal.details.navigation.as_deref(),
            Some("dê dois passos à frente")
        );
    }

    #[test]
    fn caution_with_single_vehicle() {
        let signal = KeywordExtractor.traffic("carro próximo à direita, cuidado");
        assert_eq!(signal.danger_level, DangerLevel::Caution);
        assert_eq!(signal.vehicles, set(&["carro"]));
        assert!(signal.signs.is_empty());
        assert_eq!(signal.traffic_light, None);
        assert_eq!(signal.safe_to_cross, None);
    }

    #[test]
    fn danger_priority_order() {
        assert_eq!(
            KeywordExtractor.traffic("Perigo crítico, carro muito próximo").danger_level,
            DangerLevel::Critical
        );
        assert_eq!(
            KeywordExtractor.traffic("NÃO ATRAVESSE agora").danger_level,
            DangerLevel::Critical
        );
        assert_eq!(
            KeywordExtractor.traffic("perigo: ônibus se aproximando").danger_level,
            DangerLevel::Danger
        );
        assert_eq!(
            KeywordExtractor.traffic("atenção máxima no cruzamento").danger_level,
            DangerLevel::Danger
        );
        assert_eq!(
            KeywordExtractor.traffic("atenção ao meio-fio").danger_level,
            DangerLevel::Caution
        );
        assert_eq!(
            KeywordExtractor.traffic("rua tranquila").danger_level,
            DangerLevel::Safe
        );
    }

    #[test]
    fn every_vehicle_and_sign_is_kept() {
        let signal = KeywordExtractor.traffic(
            "Ônibus e moto parados, bicicleta na ciclovia. Placa de STOP e velocidade máxima 40.",
        );
        assert_eq!(signal.vehicles, set(&["bicicleta", "moto", "ônibus"]));
        assert_eq!(signal.signs, set(&["PARE", "Limite de Velocidade"]));
    }

    #[test]
    fn crosswalk_needs_both_words() {
        assert!(!KeywordExtractor.traffic("faixa contínua na via").crosswalk_detected);
        assert!(!KeywordExtractor.traffic("pedestre na calçada").crosswalk_detected);
        assert!(KeywordExtractor.traffic("Faixa de Pedestre à frente").crosswalk_detected);
    }

    #[test]
    fn lights_and_verdicts() {
        let red = KeywordExtractor.traffic("Semáforo vermelho para pedestres, não atravesse");
        assert_eq!(red.traffic_light, Some(TrafficLight::Red));
        assert_eq!(red.safe_to_cross, Some(false));

        let green = KeywordExtractor.traffic("sinal verde, pode atravessar com atenção");
        assert_eq!(green.traffic_light, Some(TrafficLight::Green));
        assert_eq!(green.safe_to_cross, Some(true));

        let yellow = KeywordExtractor.traffic("semáforo amarelo, não é seguro");
        assert_eq!(yellow.traffic_light, Some(TrafficLight::Yellow));
        assert_eq!(yellow.safe_to_cross, Some(false));
    }
}
