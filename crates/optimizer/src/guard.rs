//! Complexity guard consulted before a node tree is compiled

use tracing::warn;

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, OptimizerResult};
use crate::node::OptimizationNode;

/// Reject trees whose complexity exceeds `config.max_complexity`.
///
/// Returns the complexity score when the tree is acceptable.
pub fn ensure_within_complexity(
    node: &OptimizationNode,
    config: &OptimizerConfig,
) -> OptimizerResult<usize> {
    let complexity = node.complexity();
    if complexity > config.max_complexity {
        warn!(
            entity = %node.entity(),
            complexity,
            max = config.max_complexity,
            "rejecting request over complexity limit"
        );
        return Err(OptimizerError::ComplexityExceeded {
            complexity,
            max: config.max_complexity,
        });
    }
    Ok(complexity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, RequestContext};

    #[test]
    fn test_limit_is_inclusive() {
        let mut node = OptimizationNode::new(EntityType::new("Building"), RequestContext::new());
        node.child_for_join("real_estate", EntityType::new("RealEstate"))
            .unwrap()
            .child_for_join("housing_company", EntityType::new("HousingCompany"))
            .unwrap();

        let config = OptimizerConfig {
            max_complexity: 2,
            ..OptimizerConfig::default()
        };
        assert_eq!(ensure_within_complexity(&node, &config), Ok(2));

        let config = OptimizerConfig {
            max_complexity: 1,
            ..OptimizerConfig::default()
        };
        assert_eq!(
            ensure_within_complexity(&node, &config),
            Err(OptimizerError::ComplexityExceeded {
                complexity: 2,
                max: 1
            })
        );
    }
}
