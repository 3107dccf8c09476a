use crate::{Error, RouteDeclaration};

/// Routing weights are percentages; implicit splits always total this.
pub(crate) const TOTAL_WEIGHT: u32 = 100;

/// Resolves the weight of each destination of a route, in destination order.
///
/// Either every destination sets a weight, in which case the weights are used
/// verbatim, or none does and 100 is split evenly with the remainder padded
/// onto the first destination.
pub(crate) fn resolve(route: &RouteDeclaration) -> Result<Vec<u32>, Error> {
    let explicit = route
        .destinations
        .iter()
        .filter(|d| d.weight.is_some())
        .count();

    if explicit == 0 {
        return Ok(split_evenly(route.destinations.len()));
    }
    if explicit != route.destinations.len() {
        return Err(Error::MixedWeights {
            route: route.id.clone(),
        });
    }

    route
        .destinations
        .iter()
        .map(|d| {
            let weight = d.weight.unwrap_or_default();
            u32::try_from(weight)
                .ok()
                .filter(|w| *w <= TOTAL_WEIGHT)
                .ok_or_else(|| Error::WeightOutOfRange {
                    route: route.id.clone(),
                    destination: d.guid.clone(),
                    weight,
                })
        })
        .collect()
}

pub(crate) fn split_evenly(n: usize) -> Vec<u32> {
    let Ok(count) = u32::try_from(n) else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let share = TOTAL_WEIGHT / count;
    let mut weights = vec![share; n];
    weights[0] += TOTAL_WEIGHT - count * share;
    weights
}
