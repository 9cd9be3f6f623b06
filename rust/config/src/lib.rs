//! Command-line value parsers and parameter types for experiment bootstrap.

mod device;
mod flags;
mod params;
mod threads;

pub use device::*;
pub use flags::*;
pub use params::*;
pub use threads::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default() {
        let params = ExperimentParams::default();
        assert_eq!(params.dump_path, "./dumped");
        assert_eq!(params.gpu_id, -1);
        assert_eq!(params.threads, 1);
        assert_eq!(params.map_ids_train.as_slice(), &[1]);
        assert_eq!(params.map_ids_test(), &params.map_ids_train);
        assert_eq!(params.device_mapping().target(), Device::Cpu);
    }

    #[test]
    fn test_params_serde_defaults() {
        let params: ExperimentParams =
            serde_json::from_str(r#"{"exp_name": "maze", "map_ids_train": "4,2", "gpu_id": 1}"#)
                .unwrap();
        assert_eq!(params.exp_name, "maze");
        assert_eq!(params.map_ids_train.as_slice(), &[2, 4]);
        assert_eq!(params.threads, 1);
        assert!(!params.evaluate);
        assert_eq!(params.device_mapping().target(), Device::Cuda(1));
    }

    #[test]
    fn test_params_serde_rejects_bad_map_ids() {
        let res = serde_json::from_str::<ExperimentParams>(r#"{"map_ids_train": "1,1"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_params_zero_threads() {
        let params = ExperimentParams {
            threads: 0,
            ..Default::default()
        };
        assert!(params.thread_settings().is_err());
    }

    #[test]
    fn test_to_cli_args() {
        let params = ExperimentParams {
            exp_name: "sweep".into(),
            map_ids_test: Some("3,5".parse().unwrap()),
            evaluate: true,
            seed: Some(7),
            ..Default::default()
        };
        let args = params.to_cli_args();
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--exp-name") + 1], "sweep");
        assert_eq!(args[pos("--gpu-id") + 1], "-1");
        assert_eq!(args[pos("--map-ids-test") + 1], "3,5");
        assert_eq!(args[pos("--evaluate") + 1], "1");
        assert_eq!(args[pos("--visualize") + 1], "0");
        assert_eq!(args[pos("--seed") + 1], "7");
        assert!(!args.contains(&"--reload".to_string()));
    }

    #[cfg(feature = "clap")]
    mod cli {
        use clap::Parser;

        use super::*;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            params: ExperimentParams,
        }

        fn parse(args: &[&str]) -> Result<ExperimentParams, clap::Error> {
            TestCli::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
                .map(|cli| cli.params)
        }

        #[test]
        fn test_flags_parse() {
            let params = parse(&[
                "--exp-name",
                "maze",
                "--map-ids-train",
                "3,1,2",
                "--evaluate",
                "ON",
                "--gpu-id",
                "-1",
            ])
            .unwrap();
            assert_eq!(params.map_ids_train.as_slice(), &[1, 2, 3]);
            assert!(params.evaluate);
            assert!(!params.visualize);
            assert_eq!(params.gpu_id, -1);
        }

        #[test]
        fn test_bad_values_are_usage_errors() {
            for args in [
                &["--exp-name", "x", "--evaluate", "maybe"][..],
                &["--exp-name", "x", "--map-ids-train", "1,1"][..],
                &["--exp-name", "x", "--map-ids-train", "0"][..],
            ] {
                let err = parse(args).unwrap_err();
                assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
            }
        }

        #[test]
        fn test_cli_args_roundtrip() {
            let params = ExperimentParams {
                exp_name: "sweep".into(),
                gpu_id: 3,
                threads: 8,
                map_ids_train: "1,4".parse().unwrap(),
                visualize: true,
                reload: Some("./best.pth".into()),
                ..Default::default()
            };
            let args = params.to_cli_args();
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            assert_eq!(parse(&refs).unwrap(), params);
        }
    }
}
