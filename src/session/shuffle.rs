use crate::config::ShuffleSettings;
use crate::types::Question;
use rand::seq::SliceRandom;
use rand::Rng;

/// Builds the session's private copy of the questions, reordering questions
/// and options as configured. The correct index follows its option.
pub fn shuffle_round<R: Rng + ?Sized>(
    questions: &[Question],
    settings: &ShuffleSettings,
    rng: &mut R,
) -> Vec<Question> {
    let mut order: Vec<usize> = (0..questions.len()).collect();
    if settings.questions {
        order.shuffle(rng);
    }

    order
        .into_iter()
        .map(|idx| {
            let q = &questions[idx];
            let mut positions: Vec<usize> = (0..q.options.len()).collect();
            if settings.options {
                positions.shuffle(rng);
            }
            let options = positions.iter().map(|&i| q.options[i].clone()).collect();
            let correct_index = positions
                .iter()
                .position(|&i| i == q.correct_index)
                .unwrap_or(0);
            Question::new(q.text.clone(), options, correct_index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bank() -> Vec<Question> {
        (0..6)
            .map(|n| {
                Question::new(
                    format!("Question {}", n),
                    (0..5).map(|o| format!("q{}-opt{}", n, o)).collect(),
                    n % 5,
                )
            })
            .collect()
    }

    #[test]
    fn correct_option_text_survives_shuffling() {
        let original = bank();
        let settings = ShuffleSettings::default();
        let mut rng = StdRng::seed_from_u64(99);
        let shuffled = shuffle_round(&original, &settings, &mut rng);

        assert_eq!(shuffled.len(), original.len());
        for q in &shuffled {
            let source = original.iter().find(|o| o.text == q.text).unwrap();
            assert_eq!(q.correct_option(), source.correct_option());
            let mut a = q.options.clone();
            let mut b = source.options.clone();
            a.sort();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn same_seed_same_round() {
        let settings = ShuffleSettings::default();
        let a = shuffle_round(&bank(), &settings, &mut StdRng::seed_from_u64(5));
        let b = shuffle_round(&bank(), &settings, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn disabled_shuffle_is_identity() {
        let settings = ShuffleSettings {
            questions: false,
            options: false,
            seed: None,
        };
        let out = shuffle_round(&bank(), &settings, &mut StdRng::seed_from_u64(1));
        assert_eq!(out, bank());
    }
}
