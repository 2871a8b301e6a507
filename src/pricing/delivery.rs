use serde::Serialize;
use utoipa::ToSchema;

/// Flat delivery surcharge, waived once the discounted subtotal reaches
/// `free_above`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryPolicy {
    pub flat_charge: i64,
    pub free_above: Option<i64>,
}

impl DeliveryPolicy {
    pub fn charge_for(&self, discounted_subtotal: i64) -> i64 {
        match self.free_above {
            Some(threshold) if discounted_subtotal >= threshold => 0,
            _ => self.flat_charge.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waives_charge_at_threshold() {
        let policy = DeliveryPolicy {
            flat_charge: 4900,
            free_above: Some(99900),
        };
        assert_eq!(policy.charge_for(99899), 4900);
        assert_eq!(policy.charge_for(99900), 0);
    }

    #[test]
    fn default_is_free() {
        assert_eq!(DeliveryPolicy::default().charge_for(10), 0);
    }
}
