//! Build projects run in the `Build` stage and the artifacts they produce.

use crate::domain::action::{BuildProject, CommandPhase, ComputeProfile};
use crate::domain::artifact::ArtifactRef;
use crate::domain::resource::ResourceGroup;

use super::naming::Naming;

/// Names of the artifacts passed between stages.
pub mod artifacts {
    pub const SOURCE_OUTPUT: &str = "SourceOutput";
    pub const TEMPLATES_OUTPUT: &str = "TemplatesOutput";
    pub const LAMBDA_BUILD_OUTPUT: &str = "LambdaBuildOutput";
    pub const WEBSITE_BUILD_OUTPUT: &str = "WebsiteBuildOutput";
}

/// Independent build steps; all run at the same level of the Build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStep {
    SynthesiseTemplates,
    BuildLambda,
    BuildWebsite,
}

impl BuildStep {
    pub const ALL: [BuildStep; 3] = [
        BuildStep::SynthesiseTemplates,
        BuildStep::BuildLambda,
        BuildStep::BuildWebsite,
    ];

    pub fn action_name(&self) -> &'static str {
        match self {
            BuildStep::SynthesiseTemplates => "SynthesiseTemplates",
            BuildStep::BuildLambda => "BuildLambda",
            BuildStep::BuildWebsite => "BuildWebsite",
        }
    }

    fn project_suffix(&self) -> &'static str {
        match self {
            BuildStep::SynthesiseTemplates => "cdk",
            BuildStep::BuildLambda => "lambda",
            BuildStep::BuildWebsite => "website",
        }
    }

    pub fn output(&self) -> ArtifactRef {
        ArtifactRef::new(match self {
            BuildStep::SynthesiseTemplates => artifacts::TEMPLATES_OUTPUT,
            BuildStep::BuildLambda => artifacts::LAMBDA_BUILD_OUTPUT,
            BuildStep::BuildWebsite => artifacts::WEBSITE_BUILD_OUTPUT,
        })
    }

    pub fn project(&self, naming: &Naming) -> BuildProject {
        BuildProject {
            identifier: naming.build_project(self.project_suffix()),
            phases: self.phases(),
            compute: ComputeProfile::Medium,
        }
    }

    fn phases(&self) -> Vec<CommandPhase> {
        match self {
            BuildStep::SynthesiseTemplates => {
                let mut build = vec![
                    "cd $CODEBUILD_SRC_DIR/packages/cdk".to_string(),
                    "yarn test".to_string(),
                ];
                // Synthesize dependents first so a broken leaf fails fast.
                for group in ResourceGroup::ALL.iter().rev() {
                    if let Some(file) = group.template_file() {
                        build.push(format!("cdk synth {} > {}", group.name(), file));
                    }
                }
                vec![
                    phase("install", ["npm install -g cdk", "yarn"]),
                    CommandPhase {
                        name: "build".to_string(),
                        commands: build,
                    },
                ]
            }
            BuildStep::BuildLambda => vec![
                phase("install", ["yarn"]),
                phase(
                    "build",
                    [
                        "cd $CODEBUILD_SRC_DIR/packages/lambda",
                        "yarn test",
                        "yarn build",
                        "cd $CODEBUILD_SRC_DIR",
                        "yarn install --production --ignore-scripts --prefer-offline",
                    ],
                ),
            ],
            // Static files are packaged as-is.
            BuildStep::BuildWebsite => Vec::new(),
        }
    }
}

fn phase<const N: usize>(name: &str, commands: [&str; N]) -> CommandPhase {
    CommandPhase {
        name: name.to_string(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deployment::DeploymentType;

    #[test]
    fn test_outputs_are_distinct() {
        let outputs: std::collections::BTreeSet<_> =
            BuildStep::ALL.iter().map(|s| s.output()).collect();
        assert_eq!(outputs.len(), BuildStep::ALL.len());
        assert!(!outputs.contains(&ArtifactRef::new(artifacts::SOURCE_OUTPUT)));
    }

    #[test]
    fn test_project_identifiers() {
        let naming = Naming::new("ghostrider", DeploymentType::Feature);
        assert_eq!(
            BuildStep::SynthesiseTemplates.project(&naming).identifier,
            "ghostrider-feature-cdk-build"
        );
        assert_eq!(
            BuildStep::BuildLambda.project(&naming).identifier,
            "ghostrider-feature-lambda-build"
        );
        assert_eq!(
            BuildStep::BuildWebsite.project(&naming).identifier,
            "ghostrider-feature-website-build"
        );
    }

    #[test]
    fn test_synth_emits_every_stack_template() {
        let naming = Naming::new("p", DeploymentType::Release);
        let project = BuildStep::SynthesiseTemplates.project(&naming);
        let build = project.phases.iter().find(|p| p.name == "build").unwrap();
        for file in ["client.template.yaml", "api.template.yaml", "database.template.yaml"] {
            assert!(
                build.commands.iter().any(|c| c.ends_with(file)),
                "missing synth for {file}"
            );
        }
    }
}
